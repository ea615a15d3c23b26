#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    id: i64,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl Conversation {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_created_at(mut self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.created_at = timestamp;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}

impl std::fmt::Display for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.id,
            self.name,
            self.created_at.format("%Y-%m-%d %H:%M")
        )
    }
}
