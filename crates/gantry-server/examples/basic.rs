//! Minimal application: one open service, one authenticated service.
//!
//! ```sh
//! cargo run --example basic
//! curl -X POST localhost:8080/services/ping -d '{}'
//! ```

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use gantry_server::{App, GantryConfig, Reply, Service, ServiceContext, TokenStore as _};

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
struct PingInput {}

#[derive(Debug, Serialize, Default)]
struct PingOutput {
    pong: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
struct LoginInput {
    #[garde(length(min = 1))]
    username: String,
    #[garde(length(min = 1))]
    password: String,
}

#[derive(Debug, Serialize, Default)]
struct LoginOutput {
    token: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GantryConfig::default();
    config.token.validation.enabled = true;
    config.logging.init()?;

    let app = App::new(config).await?;
    let store = app.store();
    let prefix = app.config().token.validation.cache_key_prefix.clone();

    app.register(Service::new("ping", "Ping").skip_auth().handler(
        |_ctx: ServiceContext, _input: PingInput| async move {
            Ok::<_, Reply>(PingOutput { pong: true })
        },
    ))?;

    app.register(Service::new("login", "Login").skip_auth().handler(
        move |_ctx: ServiceContext, input: LoginInput| {
            let store = store.clone();
            let prefix = prefix.clone();
            async move {
                if input.password != "hunter2" {
                    return Err(Reply::new(401, "bad credentials"));
                }
                let token = gantry_server::new_opaque_token();
                let blob = json!({"user": {"name": input.username, "role": "user"}});
                store
                    .put(&format!("{prefix}{token}"), blob.to_string().as_bytes(), None)
                    .await
                    .map_err(|e| Reply::internal(e.to_string()))?;
                Ok(LoginOutput { token })
            }
        },
    ))?;

    app.run().await?;
    Ok(())
}
