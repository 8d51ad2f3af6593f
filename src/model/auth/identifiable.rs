use crate::model::{db::user::User, mongodb::Id};

/// Something a session can be bound to.
pub trait Identifiable {
    /// The stable ID stored in the session token.
    fn id(&self) -> Id;
}

impl Identifiable for User {
    fn id(&self) -> Id {
        self.id
    }
}
