use ahash::AHashSet;

/// Lookup into the organisation's user/identity directory.
///
/// Assignment and seat allocation refuse user ids the directory does not know.
/// All methods have default implementations that accept every id.
pub trait UserDirectory: Send + Sync {
    fn contains(&self, _user_id: &str) -> bool {
        true
    }
}

/// Directory that accepts every user id.
pub struct OpenDirectory;

impl UserDirectory for OpenDirectory {}

/// Directory backed by a fixed set of user ids.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: AHashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, T>(users: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserDirectory for StaticDirectory {
    fn contains(&self, user_id: &str) -> bool {
        self.users.contains(user_id)
    }
}
