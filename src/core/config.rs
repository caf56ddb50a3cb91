use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub chat_api_url: String,
    pub child_name: String,
    pub language: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let chat_api_url = env::var("KIDCHAT_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3111/api/chat".to_string());
        let child_name = env::var("KIDCHAT_CHILD_NAME").unwrap_or_else(|_| "friend".to_string());
        let language = env::var("KIDCHAT_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        Self {
            chat_api_url,
            child_name,
            language,
        }
    }
}
