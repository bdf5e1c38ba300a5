use chrono::Duration;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// How long a typing signal stays fresh after its last refresh.
    pub typing_window: Duration,
    /// How long an online heartbeat keeps a user online.
    pub presence_window: Duration,
    /// Upper bound on message search results.
    pub search_limit: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            typing_window: Duration::seconds(3),
            presence_window: Duration::minutes(5),
            search_limit: 50,
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

impl CoreConfig {
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        let config = CoreConfig::default();
        assert_eq!(config.page_size(None), 50);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(20)), 20);
        assert_eq!(config.page_size(Some(10_000)), 200);
    }
}
