use sha2::{Digest, Sha256};

/// Incremental SHA-256 over length-prefixed tokens.
///
/// Each token is framed with its byte length so that `["ab", "c"]` and
/// `["a", "bc"]` produce different digests.
#[derive(Clone, Debug)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new(domain: &str) -> Self {
        let mut fingerprint = Self {
            hasher: Sha256::new(),
        };
        fingerprint.update(domain);
        fingerprint
    }

    pub fn update(&mut self, token: &str) -> &mut Self {
        self.hasher.update((token.len() as u64).to_be_bytes());
        self.hasher.update(token.as_bytes());
        self
    }

    pub fn finish_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
