//! Interface de linha de comando do newsforge baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, once, generate)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::selector::Style;

/// newsforge: transforma manchetes em imagens geradas com resumo.
#[derive(Debug, Parser)]
#[command(name = "newsforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML.
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Estilo aceito pela CLI, mapeado para [`Style`] internamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleArg {
    News,
    Funny,
    Artistic,
    Realistic,
}

impl From<StyleArg> for Style {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::News => Style::News,
            StyleArg::Funny => Style::Funny,
            StyleArg::Artistic => Style::Artistic,
            StyleArg::Realistic => Style::Realistic,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa ciclos agendados até receber Ctrl-C.
    Run,

    /// Executa um único ciclo e termina.
    Once,

    /// Gera uma imagem para uma manchete específica.
    Generate {
        /// Manchete a ilustrar; usa a primeira manchete dos feeds se omitida.
        #[arg(long)]
        headline: Option<String>,

        /// Estilo da imagem; escolhido pelas regras de palavra-chave se omitido.
        #[arg(long, value_enum)]
        style: Option<StyleArg>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["newsforge", "run"]);
        assert!(matches!(cli.command, Command::Run));
        assert_eq!(cli.config, PathBuf::from("newsforge.toml"));
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["newsforge", "--config", "/etc/nf.toml", "--verbose", "once"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("/etc/nf.toml"));
        assert!(matches!(cli.command, Command::Once));
    }

    #[test]
    fn cli_parses_generate_subcommand() {
        let cli = Cli::parse_from([
            "newsforge",
            "generate",
            "--headline",
            "Storm hits coast",
            "--style",
            "realistic",
        ]);
        match cli.command {
            Command::Generate { headline, style } => {
                assert_eq!(headline.as_deref(), Some("Storm hits coast"));
                assert_eq!(style.map(Style::from), Some(Style::Realistic));
            }
            _ => panic!("expected Generate command"),
        }
    }

    #[test]
    fn cli_generate_defaults() {
        let cli = Cli::parse_from(["newsforge", "generate"]);
        assert!(matches!(
            cli.command,
            Command::Generate {
                headline: None,
                style: None
            }
        ));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
