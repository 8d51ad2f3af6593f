use std::ops::{Deref, DerefMut};

use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::VerifiedIdentity;
use crate::model::mongodb::{is_duplicate_key_error, Coll, Id};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    /// Email address verified by the identity provider. Unique across users.
    pub email: String,
    /// Display name reported by the identity provider.
    pub name: String,
    /// Whether this user has cast their vote. Only ever goes from false to true.
    #[serde(default)]
    pub has_voted: bool,
}

impl UserCore {
    /// Create a user who has not voted yet.
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            has_voted: false,
        }
    }
}

impl From<VerifiedIdentity> for UserCore {
    fn from(identity: VerifiedIdentity) -> Self {
        Self::new(identity.email, identity.name)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl User {
    /// Find the user with the given email, creating them if they don't exist yet.
    ///
    /// Two concurrent calls for the same new email both resolve to the single
    /// row that wins the unique index.
    pub async fn find_or_create(
        users: &Coll<User>,
        new_users: &Coll<NewUser>,
        new_user: NewUser,
    ) -> Result<User> {
        let with_email = doc! { "email": &new_user.email };

        if let Some(user) = users.find_one(with_email.clone(), None).await? {
            return Ok(user);
        }

        match new_users.insert_one(&new_user, None).await {
            Ok(result) => {
                let id: Id = result
                    .inserted_id
                    .as_object_id()
                    .ok_or_else(|| Error::Internal("Inserted user has no object ID".to_string()))?
                    .into();
                info!("Created user {id} for {}", new_user.email);
                Ok(User { id, user: new_user })
            }
            Err(err) if is_duplicate_key_error(&err) => {
                debug!("Lost insert race for {}, reusing existing user", new_user.email);
                users
                    .find_one(with_email, None)
                    .await?
                    .ok_or_else(|| Error::Internal("Duplicate user vanished".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}
