use std::error::Error;

use pushbullet_sdk::api::{ApiClient, FileUpload, PushTarget};
use secrecy::SecretString;

fn sniff(bytes: &[u8]) -> String {
    if bytes.starts_with(b"\x89PNG") {
        "image/png".to_string()
    } else if bytes.starts_with(b"%PDF") {
        "application/pdf".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = "REPLACE_WITH_API_KEY".to_string();
    let path = "REPLACE_WITH_FILE_PATH".to_string();
    let email = "REPLACE_WITH_RECIPIENT_EMAIL".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = ApiClient::new(SecretString::new(api_key))?;
        let upload = FileUpload::from_path(&path).await?.with_body("Sent from Rust");

        let push = client
            .push_file(upload, Some(PushTarget::Email(email)), &sniff)
            .await?;
        println!(
            "file iden={} url={}",
            push.iden,
            push.file_url.as_deref().unwrap_or_default()
        );

        Ok::<(), Box<dyn Error>>(())
    })
}
