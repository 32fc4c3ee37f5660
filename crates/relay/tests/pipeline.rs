use relay::{LoopbackSource, PassthroughProcessor, Relay, RelayConfig, Subscription};
use sampler::{Sampler, SamplerConfig};
use stream_client::ClientReconstructor;
use stream_protocol::RelayMessage;
use tokio::sync::{broadcast, watch};

fn acquire(sampler: &Sampler, values: std::ops::Range<u16>) {
    let ticker = sampler.ticker();
    for value in values {
        ticker.tick();
        let mut source = || value;
        sampler.service(&mut source, value as u32 * 5);
    }
}

fn drain_into(receiver: &mut broadcast::Receiver<RelayMessage>, client: &mut ClientReconstructor) {
    while let Ok(message) = receiver.try_recv() {
        client.handle(&message);
    }
}

fn join(subscription: Subscription) -> (ClientReconstructor, broadcast::Receiver<RelayMessage>) {
    let mut client = ClientReconstructor::default();
    if let Some(snapshot) = &subscription.snapshot {
        client.apply_snapshot(snapshot);
    }
    (client, subscription.receiver)
}

fn timeline(client: &ClientReconstructor) -> Vec<(i64, u16)> {
    client.view().map(|p| (p.relative_ms, p.value)).collect()
}

#[tokio::test]
async fn test_early_and_late_listeners_converge() {
    let sampler = Sampler::new(SamplerConfig::default());
    let (mut relay, _handle) = Relay::new(
        RelayConfig::default(),
        LoopbackSource::new(sampler.encoder()),
        PassthroughProcessor,
    );

    let (mut early, mut early_rx) = join(relay.subscribe());

    acquire(&sampler, 0..10);
    assert_eq!(relay.poll_once().await, 10);
    relay.publish_tick();
    drain_into(&mut early_rx, &mut early);

    // Late listener joins with samples pending but not yet published.
    acquire(&sampler, 10..25);
    assert_eq!(relay.poll_once().await, 15);
    let (mut late, mut late_rx) = join(relay.subscribe());
    assert_eq!(late.len(), 10);

    acquire(&sampler, 25..40);
    relay.poll_once().await;
    relay.publish_tick();
    drain_into(&mut early_rx, &mut early);
    drain_into(&mut late_rx, &mut late);

    let expected: Vec<(i64, u16)> = (0..40u16).map(|v| (v as i64 * 5, v)).collect();
    assert_eq!(timeline(&early), expected);
    assert_eq!(timeline(&late), expected);
    assert_eq!(relay.stats().samples_decoded, 40);
}

#[tokio::test]
async fn test_sampler_overflow_reaches_meta() {
    let sampler = Sampler::new(SamplerConfig {
        ring_capacity: 8,
        ..SamplerConfig::default()
    });
    let (mut relay, _handle) = Relay::new(
        RelayConfig::default(),
        LoopbackSource::new(sampler.encoder()),
        PassthroughProcessor,
    );
    let (mut client, mut rx) = join(relay.subscribe());

    acquire(&sampler, 0..12);
    assert_eq!(relay.poll_once().await, 8);
    relay.publish_tick();
    drain_into(&mut rx, &mut client);

    assert_eq!(relay.stats().overflow_events, 1);
    let meta = client.meta().expect("meta published");
    assert_eq!(meta.overflow_events, 1);
    assert_eq!(meta.status, "Connected (loopback)");

    // The newest samples survive; the anchor is the oldest kept one.
    let values: Vec<u16> = client.view().map(|p| p.value).collect();
    assert_eq!(values, (4..12).collect::<Vec<u16>>());
    assert_eq!(client.anchor_ms(), Some(20));
}

#[tokio::test]
async fn test_running_relay_streams_to_handle_subscriber() {
    let sampler = Sampler::new(SamplerConfig::default());
    let config = RelayConfig {
        poll_interval_ms: 5,
        publish_interval_ms: 10,
        ..RelayConfig::default()
    };
    let (relay, handle) = Relay::new(config, LoopbackSource::new(sampler.encoder()), PassthroughProcessor);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(relay.run(shutdown_rx));

    let (mut client, mut rx) = join(handle.subscribe().await.unwrap());
    acquire(&sampler, 0..50);

    let mut received = 0;
    while received < 50 {
        let message = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("relay kept publishing")
            .unwrap();
        if let RelayMessage::Delta(delta) = &message {
            received += delta.len();
        }
        client.handle(&message);
    }

    let expected: Vec<(i64, u16)> = (0..50u16).map(|v| (v as i64 * 5, v)).collect();
    assert_eq!(timeline(&client), expected);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}
