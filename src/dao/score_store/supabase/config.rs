use super::error::{SupabaseDaoError, SupabaseResult};

/// Runtime configuration describing how to reach the Supabase REST and auth APIs.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service or anon key sent as `apikey` and bearer token.
    pub api_key: String,
    /// Postgres schema exposed through PostgREST; `public` when unset.
    pub schema: Option<String>,
}

impl SupabaseConfig {
    /// Construct a configuration from the project URL and its API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            schema: None,
        }
    }

    /// Target a non-default schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> SupabaseResult<Self> {
        let base_url = std::env::var("SUPABASE_URL").map_err(|_| {
            SupabaseDaoError::MissingEnvVar {
                var: "SUPABASE_URL",
            }
        })?;
        let api_key = std::env::var("SUPABASE_KEY").map_err(|_| {
            SupabaseDaoError::MissingEnvVar {
                var: "SUPABASE_KEY",
            }
        })?;

        let mut config = Self::new(base_url, api_key);
        if let Some(schema) = std::env::var("SUPABASE_SCHEMA")
            .ok()
            .filter(|schema| !schema.trim().is_empty())
        {
            config = config.with_schema(schema);
        }

        Ok(config)
    }

    /// Project URL without a trailing slash.
    pub fn trimmed_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
