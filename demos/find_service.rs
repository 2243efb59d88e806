//! Service discovery client demo.
//!
//! Searches for service 0x1234 on the SD multicast group and reports
//! lifecycle transitions. Point any SOME/IP-SD server at the default
//! group (224.224.224.245:30490) to see the client bind to it.

use std::time::Duration;

use someip_sd::{SdClient, SdClientConfig, SdClientState, ServiceId, UdpSdTransport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("SOME/IP-SD Find Service Demo");
    println!("============================\n");

    let transport = UdpSdTransport::bind()?;
    println!("SD transport bound on {}", transport.local_addr()?);

    let mut config = SdClientConfig::new(ServiceId(0x1234));
    config.service_requested = true;
    let client = SdClient::new(transport, config)?;

    println!("Searching for service 0x1234 (any instance, any version)...\n");

    let mut last_state = client.current_state();
    println!("state: {last_state}");

    for _ in 0..300 {
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = client.current_state();
        if state != last_state {
            println!("state: {state}");
            last_state = state;
        }

        if state == SdClientState::ServiceReady {
            println!("\nService is ready for use.");
            break;
        }
        if state == SdClientState::Stopped {
            println!("\nRetransmissions exhausted without an offer.");
            break;
        }
    }

    client.stop();
    Ok(())
}
