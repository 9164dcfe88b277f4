//! Password authentication (Algorithms 6, 7, 11 and 12)

use log::debug;
use zeroize::Zeroizing;

use crate::crypto::rc4::rc4;
use crate::error::{PDFDecryptError, PDFDecryptResult};
use crate::pdf::StringObject;
use super::key_derivation::{compute_decryption_key, compute_hash, slice, unpad_password, PADDING};
use super::{AuthState, PasswordType, StandardSecurityHandler};

/// Outcome of checking one candidate
struct Verdict {
    kind: PasswordType,
    key: Option<Zeroizing<Vec<u8>>>,
}

fn xor_key(key: &[u8], value: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ value).collect()
}

impl StandardSecurityHandler {
    /// Check the password against the document. Owner takes precedence
    /// over user. Calling it again starts from scratch.
    pub fn verify_password(&mut self) -> PDFDecryptResult<bool> {
        self.decryption_key = None;
        self.recovered_user_password = None;
        self.password.reset();

        let verdict = match self.data.revision() {
            2 => self.authenticate_r2()?,
            3 | 4 => self.authenticate_r3_r4()?,
            r if r >= 5 => self.authenticate_r5_r6(r)?,
            r => return Err(PDFDecryptError::UnsupportedRevision(r)),
        };

        match verdict {
            Some(Verdict { kind, key }) => {
                self.password.set_type(kind);
                self.password.verify();
                self.decryption_key = key;
                self.state = match kind {
                    PasswordType::Owner => AuthState::OwnerAuthenticated,
                    PasswordType::User => AuthState::UserAuthenticated,
                };
                debug!("Authenticated as {:?} (R{})", kind, self.data.revision());
                Ok(true)
            }
            None => {
                self.state = AuthState::Failed;
                debug!("Password rejected (R{})", self.data.revision());
                Ok(false)
            }
        }
    }

    /// Algorithm 4 comparison: RC4 of the padding string against `U`
    fn check_user_entry_r2(&self, key: &[u8]) -> PDFDecryptResult<bool> {
        let u = self.data.user();
        Ok(rc4(key, &PADDING)?.as_slice() == &u[..u.len().min(32)])
    }

    /// Algorithm 5 comparison for revisions 3 and 4
    fn check_user_entry(&self, key: &[u8]) -> PDFDecryptResult<bool> {
        let mut input = PADDING.to_vec();
        input.extend_from_slice(self.data.id());
        let mut encrypted = rc4(key, &md5::compute(&input).0)?;
        for i in 1..=19u8 {
            encrypted = rc4(&xor_key(key, i), &encrypted)?;
        }
        let u = self.data.user();
        Ok(u.len() >= 16 && encrypted[..16] == u[..16])
    }

    fn authenticate_r2(&mut self) -> PDFDecryptResult<Option<Verdict>> {
        let owner_key = compute_decryption_key(&self.data, self.password.content(), true);
        let o = self.data.owner();
        let recovered = Zeroizing::new(unpad_password(&rc4(&owner_key, &o[..o.len().min(32)])?));
        let key = compute_decryption_key(&self.data, &recovered, false);
        if self.check_user_entry_r2(&key)? {
            self.recovered_user_password = Some(recovered);
            return Ok(Some(Verdict { kind: PasswordType::Owner, key: Some(key) }));
        }

        let key = compute_decryption_key(&self.data, self.password.content(), false);
        if self.check_user_entry_r2(&key)? {
            return Ok(Some(Verdict { kind: PasswordType::User, key: Some(key) }));
        }
        Ok(None)
    }

    fn authenticate_r3_r4(&mut self) -> PDFDecryptResult<Option<Verdict>> {
        let owner_key = compute_decryption_key(&self.data, self.password.content(), true);
        let o = self.data.owner();
        let mut decrypted = o[..o.len().min(32)].to_vec();
        for i in (0..=19u8).rev() {
            decrypted = rc4(&xor_key(&owner_key, i), &decrypted)?;
        }
        let recovered = Zeroizing::new(unpad_password(&decrypted));
        let key = compute_decryption_key(&self.data, &recovered, false);
        if self.check_user_entry(&key)? {
            self.recovered_user_password = Some(recovered);
            return Ok(Some(Verdict { kind: PasswordType::Owner, key: Some(key) }));
        }

        let key = compute_decryption_key(&self.data, self.password.content(), false);
        if self.check_user_entry(&key)? {
            return Ok(Some(Verdict { kind: PasswordType::User, key: Some(key) }));
        }
        Ok(None)
    }

    /// Revision 5 uses a single SHA-256, revision 6 the iterated hash. The
    /// file key is recovered later by `prepare`.
    fn authenticate_r5_r6(&self, revision: i64) -> PDFDecryptResult<Option<Verdict>> {
        let o = self.data.owner();
        let u = self.data.user();
        let password = self.password.content();

        let owner_salt = slice(o, 32, 40, "O")?;
        let user_key = slice(u, 0, 48, "U")?;
        let (owner_hash, _) = compute_hash(password, owner_salt, user_key, revision)?;
        if owner_hash.as_slice() == slice(o, 0, 32, "O")? {
            return Ok(Some(Verdict { kind: PasswordType::Owner, key: None }));
        }

        let (user_hash, _) = compute_hash(password, slice(u, 32, 40, "U")?, &[], revision)?;
        if user_hash.as_slice() == slice(u, 0, 32, "U")? {
            return Ok(Some(Verdict { kind: PasswordType::User, key: None }));
        }
        Ok(None)
    }
}
