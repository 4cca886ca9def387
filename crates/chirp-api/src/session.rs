/// The signed-in user a call acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    uid: String,
}

impl Session {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn is(&self, uid: &str) -> bool {
        self.uid == uid
    }
}
