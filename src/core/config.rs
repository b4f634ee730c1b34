use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub minio: MinIOConfig,
    pub broadcast: BroadcastConfig,
    pub issues: IssueConfig,
    pub accounts: AccountConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Settings for locally issued access tokens
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_token_ttl: Duration,
    pub jwt_leeway: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration for issue photos
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Public endpoint URL used when building image URLs (defaults to endpoint)
    pub public_endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Prefix readable without credentials (e.g., "public")
    pub public_prefix: String,
}

/// Which broadcast relay receives realtime events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastDriver {
    Pusher,
    Log,
    Null,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub driver: BroadcastDriver,
    pub pusher: Option<PusherConfig>,
}

/// Credentials and endpoint of a Pusher-compatible relay (Pusher, Soketi, Reverb)
#[derive(Debug, Clone)]
pub struct PusherConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scheme: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone)]
pub struct IssueConfig {
    /// Issues a reporter may submit per rolling 7 days, 0 disables the quota
    pub weekly_submission_limit: i64,
    pub max_images: usize,
    pub max_image_size: usize,
}

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub sector_email_domain: String,
    pub sector_default_password: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            minio: MinIOConfig::from_env()?,
            broadcast: BroadcastConfig::from_env()?,
            issues: IssueConfig::from_env()?,
            accounts: AccountConfig::from_env()?,
        })
    }
}

impl AppConfig {
    // Five 10MB photos plus multipart overhead
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 60 * 1024 * 1024;

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_or("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_or("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_or("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_or("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600; // 7 days
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "JWT_SECRET environment variable is required".to_string())?;

        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "civic-report".to_string());

        let ttl_secs = parse_or("ACCESS_TOKEN_TTL_SECS", Self::DEFAULT_ACCESS_TOKEN_TTL_SECS)?;
        let leeway_secs = parse_or("JWT_LEEWAY", Self::DEFAULT_JWT_LEEWAY_SECS)?;

        Ok(Self {
            jwt_secret,
            issuer,
            access_token_ttl: Duration::from_secs(ttl_secs),
            jwt_leeway: Duration::from_secs(leeway_secs),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Civic Report API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Municipal issue reporting API".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl MinIOConfig {
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());
        let public_endpoint =
            env::var("MINIO_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        Ok(Self {
            endpoint,
            public_endpoint,
            access_key: env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            bucket: env::var("MINIO_BUCKET").unwrap_or_else(|_| "civic-report".to_string()),
            region: env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            public_prefix: env::var("MINIO_PUBLIC_PREFIX").unwrap_or_else(|_| "public".to_string()),
        })
    }
}

impl BroadcastDriver {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "pusher" => Ok(Self::Pusher),
            "log" => Ok(Self::Log),
            "null" | "none" => Ok(Self::Null),
            other => Err(format!(
                "BROADCAST_DRIVER must be one of pusher, log, null (got '{}')",
                other
            )),
        }
    }
}

impl BroadcastConfig {
    pub fn from_env() -> Result<Self, String> {
        let driver =
            BroadcastDriver::parse(&env::var("BROADCAST_DRIVER").unwrap_or_else(|_| "log".into()))?;

        // Channel auth signs with the app secret, so credentials are loaded
        // whenever present even if events only go to the log
        let pusher = match PusherConfig::from_env() {
            Ok(pusher) => Some(pusher),
            Err(e) if driver == BroadcastDriver::Pusher => return Err(e),
            Err(_) => None,
        };

        Ok(Self { driver, pusher })
    }
}

impl PusherConfig {
    pub fn from_env() -> Result<Self, String> {
        let required = |name: &str| {
            env::var(name)
                .ok()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| format!("{} environment variable is required", name))
        };
        // Empty host/port/scheme would produce URLs like https://:443
        let optional = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());

        let port = optional("PUSHER_PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .map_err(|_| "PUSHER_PORT must be a valid port".to_string())?;

        let use_tls = optional("PUSHER_USE_TLS")
            .or_else(|| optional("PUSHER_APP_USE_TLS"))
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        Ok(Self {
            app_id: required("PUSHER_APP_ID")?,
            key: required("PUSHER_APP_KEY")?,
            secret: required("PUSHER_APP_SECRET")?,
            cluster: optional("PUSHER_APP_CLUSTER").unwrap_or_else(|| "mt1".to_string()),
            host: optional("PUSHER_HOST"),
            port,
            scheme: optional("PUSHER_SCHEME"),
            use_tls,
        })
    }

    /// Base URL of the relay's HTTP API
    pub fn api_base_url(&self) -> String {
        let scheme = self
            .scheme
            .clone()
            .unwrap_or_else(|| if self.use_tls { "https" } else { "http" }.to_string());
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| format!("api-{}.pusher.com", self.cluster));

        match self.port {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        }
    }
}

impl IssueConfig {
    const DEFAULT_WEEKLY_SUBMISSION_LIMIT: i64 = 5;
    const DEFAULT_MAX_IMAGES: usize = 5;
    const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let weekly_submission_limit = parse_or(
            "SUBMISSION_WEEKLY_LIMIT",
            Self::DEFAULT_WEEKLY_SUBMISSION_LIMIT,
        )?;
        if weekly_submission_limit < 0 {
            return Err("SUBMISSION_WEEKLY_LIMIT must not be negative".to_string());
        }

        Ok(Self {
            weekly_submission_limit,
            max_images: parse_or("ISSUE_MAX_IMAGES", Self::DEFAULT_MAX_IMAGES)?,
            max_image_size: parse_or("ISSUE_MAX_IMAGE_SIZE", Self::DEFAULT_MAX_IMAGE_SIZE)?,
        })
    }
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            weekly_submission_limit: Self::DEFAULT_WEEKLY_SUBMISSION_LIMIT,
            max_images: Self::DEFAULT_MAX_IMAGES,
            max_image_size: Self::DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

impl AccountConfig {
    pub fn from_env() -> Result<Self, String> {
        let admin_email = env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());
        if admin_email.is_some() != admin_password.is_some() {
            return Err("ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string());
        }

        Ok(Self {
            sector_email_domain: env::var("SECTOR_EMAIL_DOMAIN")
                .unwrap_or_else(|_| "report.com".to_string()),
            sector_default_password: env::var("SECTOR_DEFAULT_PASSWORD")
                .unwrap_or_else(|_| "password".to_string()),
            admin_email,
            admin_password,
        })
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            sector_email_domain: "report.com".to_string(),
            sector_default_password: "password".to_string(),
            admin_email: None,
            admin_password: None,
        }
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr + ToString,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|_| format!("{} must be a valid number", name))
}
