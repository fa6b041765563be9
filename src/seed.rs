use crate::config::UsersConfig;
use crate::entities::RegisterRequest;
use crate::error::{Error, Result};
use crate::Services;

/// Demo accounts created by `todo_api seed`, as (name, email, password, todo title).
///
/// The passwords are a base; see [`demo_password`].
pub const DEMO_USERS: &[(&str, &str, &str, &str)] = &[
    ("Admin", "admin@example.com", "admin-password", "secret admin data"),
    ("User One", "user1@example.com", "password1", "user1 data"),
    ("User Two", "user2@example.com", "password2", "user2 data"),
];

/// The password a demo account is registered with: `base`, padded with `!` up to
/// `users.min_password_length` so seeding works under any configured minimum.
pub fn demo_password(base: &str, users: &UsersConfig) -> String {
    let missing = users
        .min_password_length
        .saturating_sub(base.chars().count());
    format!("{base}{}", "!".repeat(missing))
}

/// Populate the database with demo users and one todo each.
/// Accounts that already exist are left alone. Returns the number of users created.
pub async fn seed_data(services: &Services, users: &UsersConfig) -> Result<usize> {
    let mut created = 0;

    for (name, email, password, title) in DEMO_USERS {
        let registered = services
            .users
            .register(RegisterRequest {
                name: Some(name.to_string()),
                email: email.to_string(),
                password: demo_password(password, users),
            })
            .await;

        let user = match registered {
            Ok(user) => user,
            Err(Error::Conflict { .. }) => {
                tracing::info!(email, "demo user already present, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };

        services.todos.create(&user, title).await?;
        created += 1;
    }

    Ok(created)
}
