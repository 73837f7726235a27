use std::error::Error;

use pushbullet_sdk::api::ApiClient;
use pushbullet_sdk::retry::{retry_api, RetryPolicy};
use secrecy::SecretString;

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = "REPLACE_WITH_API_KEY".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = ApiClient::new(SecretString::new(api_key))?;
        let policy = RetryPolicy::interactive();

        let user = retry_api(&policy, |_| client.current_user()).await?;
        println!("account {} <{}>", user.name, user.email);

        let devices = retry_api(&policy, |_| client.list_devices()).await?;
        for device in devices.iter().filter(|device| device.active) {
            println!(
                "{} {} pushable={}",
                device.iden,
                device.display_name(),
                device.pushable
            );
        }

        Ok::<(), Box<dyn Error>>(())
    })
}
