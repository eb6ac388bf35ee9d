//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量管理

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回解析结果
    fn lookup() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "DCIA_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// Ollama 后端相关环境变量
pub mod ollama {
    use super::*;

    /// 后端地址
    pub struct BaseUrl;
    impl EnvVar<String> for BaseUrl {
        const NAME: &'static str = "OLLAMA_BASE_URL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("http://localhost:11434".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Base URL of the Ollama server";

        fn parse(value: &str) -> EnvResult<String> {
            let raw = value.trim();
            match url::Url::parse(raw) {
                Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                    Ok(raw.trim_end_matches('/').to_string())
                }
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Base URL must be an http:// or https:// URL".to_string(),
                }),
            }
        }
    }

    /// 默认模型
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "OLLAMA_MODEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("mistral-small:latest".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Default model used for generation";

        fn parse(value: &str) -> EnvResult<String> {
            let model = value.trim();
            if model.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Model name cannot be empty".to_string(),
                });
            }
            Ok(model.to_string())
        }
    }

    /// 单次调用超时
    pub struct Timeout;
    impl EnvVar<Duration> for Timeout {
        const NAME: &'static str = "OLLAMA_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(120));
        const DESCRIPTION: &'static str = "Timeout of a single backend call in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 3600)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }

    /// 最大尝试次数
    pub struct MaxRetries;
    impl EnvVar<usize> for MaxRetries {
        const NAME: &'static str = "OLLAMA_MAX_RETRIES";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Maximum attempts per buffered generation call";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 10)
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 批次大小
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(10);
        const DESCRIPTION: &'static str = "Number of texts per batch in batch translation";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1000)
        }
    }

    /// 上传大小上限
    pub struct MaxUploadMb;
    impl EnvVar<usize> for MaxUploadMb {
        const NAME: &'static str = "MAX_UPLOAD_MB";
        const DEFAULT: Option<usize> = Some(50);
        const DESCRIPTION: &'static str = "Maximum accepted document size in megabytes";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1024)
        }
    }
}

/// 代理相关环境变量
pub mod proxy {
    use super::*;

    pub struct HttpProxy;
    impl EnvVar<String> for HttpProxy {
        const NAME: &'static str = "HTTP_PROXY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Proxy used for http:// backend URLs";

        fn parse(value: &str) -> EnvResult<String> {
            parse_proxy(value, Self::NAME)
        }
    }

    pub struct HttpsProxy;
    impl EnvVar<String> for HttpsProxy {
        const NAME: &'static str = "HTTPS_PROXY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Proxy used for https:// backend URLs";

        fn parse(value: &str) -> EnvResult<String> {
            parse_proxy(value, Self::NAME)
        }
    }
}

/// Web服务器相关环境变量
pub mod web {
    use super::*;

    /// 绑定地址
    pub struct BindAddress;
    impl EnvVar<String> for BindAddress {
        const NAME: &'static str = "DCIA_BIND_ADDRESS";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("127.0.0.1".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Web server bind address";

        fn parse(value: &str) -> EnvResult<String> {
            let addr = value.trim();
            if addr.parse::<std::net::IpAddr>().is_ok() || addr == "localhost" {
                Ok(addr.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid bind address '{}'", value),
                })
            }
        }
    }

    /// 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "DCIA_PORT";
        const DEFAULT: Option<u16> = Some(8000);
        const DESCRIPTION: &'static str = "Web server port";

        fn parse(value: &str) -> EnvResult<u16> {
            let port: u16 = value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid port number (1-65535)".to_string(),
            })?;

            if port == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Port cannot be 0".to_string(),
                });
            }

            Ok(port)
        }
    }
}

/// 辅助函数
fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_proxy(value: &str, var_name: &str) -> EnvResult<String> {
    let raw = value.trim();
    url::Url::parse(raw)
        .map(|_| raw.to_string())
        .map_err(|e| EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid proxy URL: {}", e),
        })
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,

    // 后端配置
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_timeout: Duration,
    pub ollama_max_retries: usize,

    // 翻译配置
    pub batch_size: usize,
    pub max_upload_mb: usize,

    // 代理配置
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,

    // Web配置
    pub web_bind_address: String,
    pub web_port: u16,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,

            ollama_base_url: ollama::BaseUrl::get()?,
            ollama_model: ollama::Model::get()?,
            ollama_timeout: ollama::Timeout::get()?,
            ollama_max_retries: ollama::MaxRetries::get()?,

            batch_size: translation::BatchSize::get()?,
            max_upload_mb: translation::MaxUploadMb::get()?,

            http_proxy: proxy::HttpProxy::lookup().transpose()?,
            https_proxy: proxy::HttpsProxy::lookup().transpose()?,

            web_bind_address: web::BindAddress::get()?,
            web_port: web::Port::get()?,
        })
    }

    /// 打印配置摘要（隐藏代理凭据）
    pub fn print_summary(&self) {
        println!("Environment Configuration Summary:");
        println!("  Log Level: {}", self.log_level);
        println!("  Ollama: {} (model {})", self.ollama_base_url, self.ollama_model);
        println!(
            "  Timeout: {}s, attempts: {}",
            self.ollama_timeout.as_secs(),
            self.ollama_max_retries
        );
        println!("  Web Server: {}:{}", self.web_bind_address, self.web_port);
        if self.http_proxy.is_some() || self.https_proxy.is_some() {
            println!("  Proxy: [configured]");
        }
    }
}

fn doc_line<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        V::NAME,
        V::DESCRIPTION,
        V::DEFAULT
    ));
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    doc_line::<String, core::LogLevel>(&mut docs);

    docs.push_str("\n## Ollama Backend\n\n");
    doc_line::<String, ollama::BaseUrl>(&mut docs);
    doc_line::<String, ollama::Model>(&mut docs);
    doc_line::<Duration, ollama::Timeout>(&mut docs);
    doc_line::<usize, ollama::MaxRetries>(&mut docs);

    docs.push_str("\n## Translation\n\n");
    doc_line::<usize, translation::BatchSize>(&mut docs);
    doc_line::<usize, translation::MaxUploadMb>(&mut docs);

    docs.push_str("\n## Proxy\n\n");
    doc_line::<String, proxy::HttpProxy>(&mut docs);
    doc_line::<String, proxy::HttpsProxy>(&mut docs);

    docs.push_str("\n## Web Server Configuration\n\n");
    doc_line::<String, web::BindAddress>(&mut docs);
    doc_line::<u16, web::Port>(&mut docs);

    docs
}
