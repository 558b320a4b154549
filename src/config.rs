use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub session_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_token: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub reset_link_base: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "deptsite".into()),
            session_ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            reset_ttl_minutes: std::env::var("RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        let mail = MailConfig {
            api_url: std::env::var("MAIL_API_URL").ok(),
            api_token: std::env::var("MAIL_API_TOKEN").unwrap_or_default(),
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".into()),
        };
        let reset_link_base = std::env::var("RESET_LINK_BASE")
            .unwrap_or_else(|_| "http://localhost:3000/reset-password".into());
        Ok(Self {
            database_url,
            jwt,
            mail,
            reset_link_base,
        })
    }
}
