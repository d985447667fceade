//! Simulated user selection.
//!
//! `HOT_USER_GROUPS` splits `TOTAL_USERS` into contiguous groups, one per
//! percentage. The concentration table picks a group, then a user is drawn
//! uniformly inside it. With 1000 users and `HOT_USER_GROUPS=80,20`, 80% of
//! messages come from users 0..500 and 20% from users 500..1000.

use crate::concentration::ConcentrationTable;
use crate::error::GeneratorError;
use rand::Rng;
use uuid::Uuid;

/// A contiguous range of user numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserGroup {
    pub start: u64,
    pub len: u64,
}

/// Picks the simulated user for each message.
#[derive(Debug, Clone)]
pub struct UserSelector {
    groups: ConcentrationTable<UserGroup>,
    prefix: String,
    random_ids: bool,
}

impl UserSelector {
    /// Build a selector for `total_users` split by `hot_user_groups`.
    pub fn new(
        total_users: u64,
        hot_user_groups: &[u32],
        prefix: impl Into<String>,
        random_ids: bool,
    ) -> Result<Self, GeneratorError> {
        let group_count = hot_user_groups.len() as u64;
        if group_count == 0 {
            return Err(GeneratorError::InvalidUsers(
                "HOT_USER_GROUPS is empty".to_string(),
            ));
        }
        if total_users < group_count {
            return Err(GeneratorError::InvalidUsers(format!(
                "TOTAL_USERS ({total_users}) must be at least the number of user groups ({group_count})"
            )));
        }

        let base = total_users / group_count;
        let groups: Vec<UserGroup> = (0..group_count)
            .map(|i| UserGroup {
                start: i * base,
                // Last group takes the remainder.
                len: if i + 1 == group_count {
                    total_users - i * base
                } else {
                    base
                },
            })
            .collect();

        Ok(Self {
            groups: ConcentrationTable::new("HOT_USER_GROUPS", groups, hot_user_groups)?,
            prefix: prefix.into(),
            random_ids,
        })
    }

    /// Draw the user id for the next message.
    pub fn next_user_id<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if self.random_ids {
            return Uuid::new_v4().to_string();
        }
        let group = self.groups.sample(rng);
        let n = group.start + rng.random_range(0..group.len);
        self.user_id(n)
    }

    /// Stable id of user number `n`.
    pub fn user_id(&self, n: u64) -> String {
        format!("{}-{}", self.prefix, n)
    }

    pub fn groups(&self) -> &[UserGroup] {
        self.groups.candidates()
    }
}
