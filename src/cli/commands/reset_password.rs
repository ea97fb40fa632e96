use crate::config::Config;
use crate::db::Store;

/// Sets a new password for a locked-out user, prompting on stdin.
pub async fn cmd_reset_password(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(user) = store.get_user_by_username(username).await? else {
        println!("User '{username}' not found.");
        return Ok(());
    };

    println!("Resetting password for '{}'.", user.username);
    println!("Enter new password (min 8 characters):");

    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);

    if password.chars().count() < 8 {
        println!("Password must be at least 8 characters.");
        return Ok(());
    }

    println!("Repeat password:");
    let mut confirm = String::new();
    std::io::stdin().read_line(&mut confirm)?;
    let confirm = confirm.trim_end_matches(['\r', '\n']);

    if password != confirm {
        println!("Passwords do not match.");
        return Ok(());
    }

    store
        .update_user_password(&user.username, password, Some(&config.security))
        .await?;

    println!("✓ Password updated for '{}'", user.username);

    Ok(())
}
