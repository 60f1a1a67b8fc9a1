//! Saved payment methods.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentMethodId, Timestamp, UserId, ValidationError};

use super::{PaymentInstrument, PaymentMethodKind};

const MAX_NICKNAME_LEN: usize = 60;

/// A tokenized instrument a user can reuse without re-entering details.
///
/// At most one saved method per user is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPaymentMethod {
    pub id: PaymentMethodId,
    pub user_id: UserId,
    pub instrument: PaymentInstrument,
    pub nickname: String,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
}

impl SavedPaymentMethod {
    pub fn new(
        user_id: UserId,
        instrument: PaymentInstrument,
        nickname: Option<String>,
        is_default: bool,
    ) -> Result<Self, ValidationError> {
        let nickname = match nickname.map(|n| n.trim().to_string()) {
            Some(n) if n.chars().count() > MAX_NICKNAME_LEN => {
                return Err(ValidationError::out_of_range(
                    "nickname",
                    1,
                    MAX_NICKNAME_LEN as i64,
                    n.chars().count() as i64,
                ));
            }
            Some(n) if !n.is_empty() => n,
            _ => instrument.default_nickname(),
        };
        Ok(Self {
            id: PaymentMethodId::new(),
            user_id,
            instrument,
            nickname,
            is_default,
            created_at: Timestamp::now(),
            last_used_at: None,
        })
    }

    pub fn kind(&self) -> PaymentMethodKind {
        self.instrument.kind()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn mark_used(&mut self) {
        self.last_used_at = Some(Timestamp::now());
    }
}
