use crate::{validate_string, Error, Validate};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: &str) -> UserId {
        UserId(String::from(id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub avatar_url: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSearch {
    /// Case-sensitive substring of the user name, empty matches everyone
    #[serde(default)]
    pub filter_text: String,
}

impl Validate for UserSearch {
    fn validate(&self) -> Result<(), Error> {
        validate_string(&self.filter_text)
    }
}
