//! Input checks that run before any store interaction.

use crate::Error;

const MAX_ID_LEN: usize = 64;
const MAX_TRANSACTION_ID_LEN: usize = 128;
const MAX_LINK_LEN: usize = 2048;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@')
}

pub(crate) fn account_id(id: &str) -> Result<(), Error> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(Error::Validation(format!(
            "account id must be 1-{MAX_ID_LEN} characters"
        )));
    }
    if !id.chars().all(is_id_char) {
        return Err(Error::Validation(format!(
            "account id '{id}' may only contain letters, digits, '.', '_', '-', '@'"
        )));
    }
    Ok(())
}

/// Campaign and moderation request ids share the account id charset.
pub(crate) fn record_id(id: &str) -> Result<(), Error> {
    if id.is_empty() || id.len() > MAX_ID_LEN || !id.chars().all(is_id_char) {
        return Err(Error::Validation(format!("malformed id '{id}'")));
    }
    Ok(())
}

pub(crate) fn transaction_id(id: &str) -> Result<(), Error> {
    if id.is_empty() || id.len() > MAX_TRANSACTION_ID_LEN || !id.chars().all(is_id_char) {
        return Err(Error::Validation("malformed payment transaction id".into()));
    }
    Ok(())
}

pub(crate) fn link(link: &str) -> Result<(), Error> {
    let rest = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .ok_or_else(|| Error::Validation("link must be an http(s) URL".into()))?;
    if rest.is_empty() || link.len() > MAX_LINK_LEN || link.chars().any(char::is_whitespace) {
        return Err(Error::Validation("malformed link".into()));
    }
    Ok(())
}
