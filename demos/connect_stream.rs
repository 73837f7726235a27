use std::error::Error;

use pushbullet_sdk::api::ApiClient;
use pushbullet_sdk::stream::{StreamError, StreamEvent, StreamSession};
use secrecy::SecretString;

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = "REPLACE_WITH_API_KEY".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = ApiClient::new(SecretString::new(api_key))?;
        let mut session = StreamSession::for_account(client).with_refill_limit(50);
        session.connect().await?;
        println!("connected watermark={:?}", session.watermark());

        let cancel = session.cancel_token();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        });

        loop {
            let event = match session.next_event().await {
                Ok(event) => event,
                Err(StreamError::Cancelled) => break,
                Err(err) => return Err(err.into()),
            };
            match event {
                StreamEvent::Push(push) => {
                    println!(
                        "push iden={} type={} title={}",
                        push.iden,
                        push.kind.as_str(),
                        push.title.as_deref().unwrap_or_default()
                    );
                }
                StreamEvent::Ephemeral(ephemeral) => {
                    println!(
                        "mirror app={} title={}",
                        ephemeral.application_name.as_deref().unwrap_or_default(),
                        ephemeral.title.as_deref().unwrap_or_default()
                    );
                }
            }
        }

        session.close().await?;
        Ok::<(), Box<dyn Error>>(())
    })
}
