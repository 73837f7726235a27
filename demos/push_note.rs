use std::error::Error;

use pushbullet_sdk::api::{ApiClient, PushBuilder};
use secrecy::SecretString;

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = "REPLACE_WITH_API_KEY".to_string();
    let device_iden = "REPLACE_WITH_DEVICE_IDEN".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = ApiClient::new(SecretString::new(api_key))?;

        let note = PushBuilder::note("Build finished", "All 214 tests passed.")
            .device(device_iden.clone())
            .build()?;
        let created = client.create_push(&note).await?;
        println!("note iden={} created={}", created.iden, created.is_created());

        let checklist = PushBuilder::list("Groceries", ["milk", "eggs", "coffee"])
            .device(device_iden)
            .build()?;
        let created = client.create_push(&checklist).await?;
        println!("list iden={} items={}", created.iden, created.items.len());

        Ok::<(), Box<dyn Error>>(())
    })
}
