//! Interface de terminal do newsforge: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`RenderProgress`] acompanha visualmente os
//! comandos manuais (`once`, `generate`); o modo agendado só registra logs.

use std::path::Path;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::{CycleReport, HeadlineFailure, OrchestratorStatus};

/// Indicador visual de progresso para uma geração no terminal.
///
/// Exibe um spinner animado durante o trabalho e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e avisos (amarelo).
pub struct RenderProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
}

impl RenderProgress {
    /// Inicia o spinner com a mensagem inicial.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e mostra o artefato gerado.
    pub fn succeeded(&self, artifact: &Path) {
        self.pb.finish_and_clear();
        println!(
            "  {} Artifact written to {}",
            self.green.apply_to("✓"),
            artifact.display()
        );
    }

    /// Finaliza o spinner e mostra a falha com a etapa correspondente.
    pub fn failed(&self, failure: &HeadlineFailure) {
        self.pb.finish_and_clear();
        println!(
            "  {} {} failed: {}",
            self.red.apply_to("✗"),
            failure.stage,
            failure.message
        );
    }

    /// Finaliza o spinner com uma mensagem de aviso.
    pub fn warn(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.yellow.apply_to("!"));
    }

    /// Finaliza o spinner e imprime o relatório de um ciclo.
    pub fn print_report(&self, report: &CycleReport) {
        self.pb.finish_and_clear();
        let header = if report.failures.is_empty() {
            &self.green
        } else {
            &self.yellow
        };
        println!(
            "{}",
            header.apply_to(format!(
                "─── Cycle: {} fetched, {} selected, {} generated ───",
                report.fetched,
                report.selected,
                report.generated.len()
            ))
        );
        for path in &report.generated {
            println!("  {} {}", self.green.apply_to("✓"), path.display());
        }
        for failure in &report.failures {
            let prefix: String = failure.headline.chars().take(50).collect();
            println!(
                "  {} [{}] {prefix}: {}",
                self.red.apply_to("✗"),
                failure.stage,
                failure.message
            );
        }
        if report.cleaned_up > 0 {
            println!("  Removed {} old artifact(s)", report.cleaned_up);
        }
    }
}

/// Imprime o estado do orquestrador em JSON.
pub fn print_status(status: &OrchestratorStatus) {
    println!("{}", Style::new().cyan().apply_to("─── Status ───"));
    println!("{}", serde_json::to_string_pretty(status).unwrap_or_default());
}
