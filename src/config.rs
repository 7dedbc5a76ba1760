// config.rs
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    // Push gateway (Expo)
    pub expo_push_url: String,
    pub expo_access_token: Option<String>,
    // Object storage
    pub storage_root: String,
    pub storage_public_url: String,
    // OAuth audiences; an empty list disables the provider
    pub google_client_ids: Vec<String>,
    pub apple_client_ids: Vec<String>,
}

pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

fn csv_var(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);
        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(10);

        let expo_push_url = std::env::var("EXPO_PUSH_URL")
            .unwrap_or_else(|_| DEFAULT_EXPO_PUSH_URL.to_string());
        let expo_access_token = std::env::var("EXPO_ACCESS_TOKEN").ok();

        let storage_root = std::env::var("STORAGE_ROOT")
            .unwrap_or_else(|_| "./uploads".to_string());
        let storage_public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/uploads", port));

        let mut allowed_origins = csv_var("ALLOWED_ORIGINS");
        if allowed_origins.is_empty() {
            allowed_origins.push("http://localhost:8081".to_string());
        }

        Config {
            database_url,
            database_max_connections,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().expect("JWT_MAXAGE must be a number of minutes"),
            port,
            allowed_origins,
            expo_push_url,
            expo_access_token,
            storage_root,
            storage_public_url,
            google_client_ids: csv_var("GOOGLE_CLIENT_IDS"),
            apple_client_ids: csv_var("APPLE_CLIENT_IDS"),
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: "postgres://localhost/jobmarket_test".to_string(),
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 60,
            port: 8000,
            allowed_origins: vec![],
            expo_push_url: DEFAULT_EXPO_PUSH_URL.to_string(),
            expo_access_token: None,
            storage_root: std::env::temp_dir().join("jobmarket-tests").display().to_string(),
            storage_public_url: "http://localhost:8000/uploads".to_string(),
            google_client_ids: vec![],
            apple_client_ids: vec![],
        }
    }
}
