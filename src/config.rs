//! Configuração do newsforge carregada a partir de `newsforge.toml`.
//!
//! A struct [`AppConfig`] agrupa as seções `[render]`, `[composition]`,
//! `[news]` e `[scheduler]`. Valores não presentes no arquivo usam defaults
//! sensíveis. As variáveis de ambiente `NEWSFORGE_SERVER_ADDRESS` e
//! `NEWSFORGE_NEWS_API_KEY` têm precedência sobre os valores do arquivo.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::schedule::Trigger;
use crate::selector::{FallbackPolicy, Style};

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "newsforge.toml";

/// Fontes do sistema tentadas, em ordem, quando `font_path` não é definido.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/msttcorefonts/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    r"C:\Windows\Fonts\arial.ttf",
];

/// Configuração de nível superior carregada de `newsforge.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub composition: CompositionConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Parâmetros do servidor de renderização e do job de geração.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// `host:porta` ou URL completa do servidor.
    #[serde(default = "default_server_address")]
    pub server_address: String,

    /// Template de workflow exportado do servidor; usa o embutido se ausente.
    #[serde(default)]
    pub workflow_path: Option<PathBuf>,

    #[serde(default = "default_checkpoint")]
    pub checkpoint: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_steps")]
    pub steps: u32,

    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,

    #[serde(default = "default_sampler")]
    pub sampler: String,

    #[serde(default = "default_noise_scheduler")]
    pub scheduler: String,

    /// Semente fixa; valores negativos geram uma semente aleatória por job.
    #[serde(default = "default_seed")]
    pub seed: i64,

    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,

    /// Substituições de template de prompt por estilo (`{headline}` é o marcador).
    #[serde(default)]
    pub prompt_templates: HashMap<String, String>,

    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Intervalo entre consultas ao histórico de jobs, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Prazo máximo de espera por um job, em segundos.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout de cada requisição HTTP individual, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Parâmetros da composição final (imagem + texto).
#[derive(Debug, Clone, Deserialize)]
pub struct CompositionConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Fonte TrueType para título e resumo. Se ausente, procura uma fonte
    /// comum do sistema (DejaVu Sans, Liberation Sans, Arial).
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    #[serde(default = "default_text_region_height")]
    pub text_region_height: u32,

    #[serde(default = "default_padding")]
    pub padding: u32,

    #[serde(default = "default_min_width")]
    pub min_width: u32,

    #[serde(default = "default_top_offset")]
    pub top_offset: u32,
}

/// Um feed RSS/Atom de manchetes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

/// Fontes de manchetes.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,

    /// Quantidade máxima de manchetes candidatas por ciclo.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Títulos com até este número de caracteres são descartados.
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,

    /// Chave da News API; sem ela, apenas os feeds são consultados.
    #[serde(default)]
    pub news_api_key: Option<String>,

    #[serde(default = "default_news_api_url")]
    pub news_api_url: String,
}

/// Agendamento e política de seleção dos ciclos de geração.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    #[serde(default)]
    pub use_cron: bool,

    #[serde(default = "default_cron_expression")]
    pub cron_expression: String,

    #[serde(default = "default_true")]
    pub run_immediately: bool,

    #[serde(default = "default_max_images_per_run")]
    pub max_images_per_run: usize,

    /// Pausa entre manchetes consecutivas, em segundos.
    #[serde(default = "default_generation_delay_secs")]
    pub generation_delay_secs: u64,

    #[serde(default = "default_styles")]
    pub styles: Vec<Style>,

    #[serde(default = "default_priority_keywords")]
    pub priority_keywords: Vec<String>,

    #[serde(default)]
    pub fallback: FallbackPolicy,

    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,

    #[serde(default = "default_max_image_age_days")]
    pub max_image_age_days: u64,

    /// Máximo de registros de geração mantidos em memória.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Quantas manchetes recentes são lembradas para deduplicação.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_server_address() -> String {
    "127.0.0.1:8188".to_string()
}

fn default_checkpoint() -> String {
    "dreamshaper_8.safetensors".to_string()
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    576
}

fn default_steps() -> u32 {
    25
}

fn default_cfg_scale() -> f64 {
    7.0
}

fn default_sampler() -> String {
    "dpmpp_2m".to_string()
}

fn default_noise_scheduler() -> String {
    "karras".to_string()
}

fn default_seed() -> i64 {
    -1
}

fn default_negative_prompt() -> String {
    "ugly, deformed, blurry, bad anatomy, low quality, text, watermark".to_string()
}

fn default_filename_prefix() -> String {
    "newsforge".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output/images")
}

fn default_text_region_height() -> u32 {
    300
}

fn default_padding() -> u32 {
    40
}

fn default_min_width() -> u32 {
    1024
}

fn default_top_offset() -> u32 {
    20
}

fn default_feeds() -> Vec<FeedSource> {
    [
        ("BBC News", "http://feeds.bbci.co.uk/news/rss.xml"),
        ("CNN", "http://rss.cnn.com/rss/edition.rss"),
        ("Associated Press", "https://feeds.apnews.com/rss/apf-topnews"),
    ]
    .into_iter()
    .map(|(name, url)| FeedSource {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}

fn default_fetch_limit() -> usize {
    20
}

fn default_min_title_len() -> usize {
    10
}

fn default_news_api_url() -> String {
    "https://newsapi.org/v2/top-headlines".to_string()
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_cron_expression() -> String {
    "0 * * * *".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_images_per_run() -> usize {
    3
}

fn default_generation_delay_secs() -> u64 {
    5
}

fn default_styles() -> Vec<Style> {
    vec![Style::News, Style::Funny, Style::Artistic]
}

fn default_priority_keywords() -> Vec<String> {
    [
        "breakthrough", "discover", "amazing", "incredible", "shocking", "bizarre", "unusual",
        "first", "largest", "smallest", "record", "viral", "trending", "exclusive", "mystery",
        "secret",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_image_age_days() -> u64 {
    7
}

fn default_max_history() -> usize {
    1000
}

fn default_history_window() -> usize {
    50
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            workflow_path: None,
            checkpoint: default_checkpoint(),
            width: default_width(),
            height: default_height(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            sampler: default_sampler(),
            scheduler: default_noise_scheduler(),
            seed: default_seed(),
            negative_prompt: default_negative_prompt(),
            prompt_templates: HashMap::new(),
            filename_prefix: default_filename_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            font_path: None,
            text_region_height: default_text_region_height(),
            padding: default_padding(),
            min_width: default_min_width(),
            top_offset: default_top_offset(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            fetch_limit: default_fetch_limit(),
            min_title_len: default_min_title_len(),
            news_api_key: None,
            news_api_url: default_news_api_url(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            use_cron: false,
            cron_expression: default_cron_expression(),
            run_immediately: true,
            max_images_per_run: default_max_images_per_run(),
            generation_delay_secs: default_generation_delay_secs(),
            styles: default_styles(),
            priority_keywords: default_priority_keywords(),
            fallback: FallbackPolicy::default(),
            cleanup_enabled: true,
            max_image_age_days: default_max_image_age_days(),
            max_history: default_max_history(),
            history_window: default_history_window(),
        }
    }
}

impl RenderConfig {
    /// URL base do servidor, aceitando `host:porta` ou URL completa.
    pub fn base_url(&self) -> String {
        let address = self.server_address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }

    /// Semente fixa, se configurada.
    pub fn fixed_seed(&self) -> Option<u64> {
        u64::try_from(self.seed).ok()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CompositionConfig {
    /// Fonte a carregar: a configurada, se existir, ou a primeira fonte
    /// conhecida do sistema encontrada no disco.
    pub fn resolve_font(&self) -> Option<PathBuf> {
        match &self.font_path {
            Some(path) => path.is_file().then(|| path.clone()),
            None => FONT_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|path| path.is_file()),
        }
    }
}

impl SchedulerConfig {
    pub fn generation_delay(&self) -> Duration {
        Duration::from_secs(self.generation_delay_secs)
    }

    pub fn max_image_age(&self) -> Duration {
        Duration::from_secs(self.max_image_age_days * 24 * 60 * 60)
    }

    /// Gatilho periódico: expressão cron se `use_cron`, senão intervalo fixo.
    pub fn trigger(&self) -> Result<Trigger> {
        if self.use_cron {
            Trigger::cron(&self.cron_expression)
        } else {
            Ok(Trigger::Interval(Duration::from_secs(self.interval_minutes * 60)))
        }
    }
}

impl AppConfig {
    /// Carrega a configuração do caminho fornecido.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Ok(address) = std::env::var("NEWSFORGE_SERVER_ADDRESS")
            && !address.is_empty()
        {
            config.render.server_address = address;
        }
        if let Ok(key) = std::env::var("NEWSFORGE_NEWS_API_KEY")
            && !key.is_empty()
        {
            config.news.news_api_key = Some(key);
        }

        Ok(config)
    }

    /// Rejeita combinações que impediriam um ciclo de rodar.
    pub fn validate(&self) -> Result<()> {
        if self.render.width == 0 || self.render.height == 0 {
            bail!("render.width and render.height must be positive");
        }
        if self.render.poll_interval_ms == 0 {
            bail!("render.poll_interval_ms must be positive");
        }
        if self.scheduler.max_history == 0 {
            bail!("scheduler.max_history must be positive");
        }
        if self.scheduler.history_window == 0 {
            bail!("scheduler.history_window must be positive");
        }
        if !self.scheduler.use_cron && self.scheduler.interval_minutes == 0 {
            bail!("scheduler.interval_minutes must be positive");
        }
        if let Some(path) = &self.composition.font_path
            && !path.is_file()
        {
            bail!("composition.font_path {} does not exist", path.display());
        }
        if self.composition.resolve_font().is_none() {
            bail!("no usable font found; set composition.font_path to a TrueType font");
        }
        self.scheduler.trigger()?;
        Ok(())
    }
}
