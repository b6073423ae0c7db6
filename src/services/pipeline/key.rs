use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;

use super::classifier::AspectClass;

/// Random bytes behind every key suffix
const SUFFIX_BYTES: usize = 32;

/// Object key of a published upload: `<prefix><random suffix><extension>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublishKey(String);

impl PublishKey {
    /// Key namespaced by the video's orientation
    pub fn for_aspect(aspect: AspectClass, extension: &str) -> Self {
        Self::with_prefix(aspect.prefix(), extension)
    }

    pub fn with_prefix(prefix: &str, extension: &str) -> Self {
        Self(format!("{}{}{}", prefix, random_suffix(), extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for PublishKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_suffix() -> String {
    let mut bytes = [0u8; SUFFIX_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
