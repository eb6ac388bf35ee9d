//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, SegmentOrder, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 后端设置
    pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &str = "mistral-small:latest";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
    pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
    pub const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_MAX_RETRIES: usize = 3;
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

    // 熔断器
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

    // 采样参数
    pub const DEFAULT_TOP_P: f32 = 0.9;

    // 能力受限的模型前缀
    pub const REDUCED_MODEL_PREFIXES: &[&str] = &["gemma", "phi"];

    // SCENARI 命名空间
    pub const SCENARI_CORE_NS: &str = "http://www.utc.fr/ics/scenari/v3/core";
    pub const SCENARI_PRIMITIVE_NS: &str = "http://www.utc.fr/ics/scenari/v3/primitive";

    /// 承载文本的元素：(命名空间, 本地名)，顺序即提取顺序
    pub const TEXT_ELEMENTS: &[(&str, &str)] = &[
        (SCENARI_CORE_NS, "para"),
        (SCENARI_CORE_NS, "title"),
        (SCENARI_CORE_NS, "item"),
        (SCENARI_CORE_NS, "caption"),
        (SCENARI_CORE_NS, "legend"),
        (SCENARI_CORE_NS, "label"),
        (SCENARI_CORE_NS, "question"),
        (SCENARI_CORE_NS, "answer"),
        (SCENARI_CORE_NS, "comment"),
        (SCENARI_CORE_NS, "description"),
        (SCENARI_PRIMITIVE_NS, "txt"),
    ];

    /// 整段模式下的规范段落元素
    pub const CANONICAL_PARAGRAPH: (&str, &str) = (SCENARI_CORE_NS, "para");

    // 跳过的元素（本地名）
    pub const IGNORE_ELEMENTS: &[&str] = &[
        "code", "math", "equation", "ref", "link", "url", "img", "image", "video", "audio",
        "file",
    ];

    // 支持的语言
    pub const SUPPORTED_LANGUAGES: &[(&str, &str)] =
        &[("fr", "Français"), ("en", "English"), ("ar", "العربية")];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "dcia.toml",
        "config.toml",
        ".dcia.toml",
        "~/.config/dcia/config.toml",
        "/etc/dcia/config.toml",
    ];
}

/// 是否为支持的语言代码
pub fn is_supported_language(code: &str) -> bool {
    constants::SUPPORTED_LANGUAGES
        .iter()
        .any(|(supported, _)| *supported == code)
}
