fn main() {
    println!("Run `cargo test -p scenarios` to execute the end-to-end scenarios.");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use hidd_daemon::{Daemon, Mode, RunError, Settings};
    use hidd_discovery::{DiscoveryError, InquiryResponse};
    use hidd_protocol::{BdAddr, ChannelRole, DeviceClass, SessionMetadata};
    use hidd_session::mock::{RecordingHandoff, StaticResolver};
    use hidd_session::{PairingCoordinator, PairingPolicy, PairingServer, PairingState};
    use hidd_transport::mock::MockTransport;
    use tokio_util::sync::CancellationToken;

    const PAD: &str = "00:1F:20:0A:0B:0C";

    fn pad_addr() -> BdAddr {
        PAD.parse().unwrap()
    }

    fn test_pad() -> SessionMetadata {
        SessionMetadata {
            name: "TestPad".into(),
            idle_timeout: Duration::from_secs(1800),
            descriptor: vec![0x05, 0x01, 0x09, 0x05, 0xa1, 0x01, 0xc0],
            ..SessionMetadata::default()
        }
    }

    /// Records every scan and returns `found` each time.
    fn recorded_scan(
        found: Vec<InquiryResponse>,
        scans: Arc<Mutex<u32>>,
    ) -> impl Fn(BdAddr, u8) -> Result<Vec<InquiryResponse>, DiscoveryError> {
        move |_, _| {
            *scans.lock().unwrap() += 1;
            Ok(found.clone())
        }
    }

    // Scenario A: a peer connects both channels to the server, the
    // resolver knows it, the driver takes the session.
    #[tokio::test(start_paused = true)]
    async fn server_hands_off_connecting_peer() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let coordinator = PairingCoordinator::new(
            transport.clone(),
            StaticResolver::ok(test_pad()),
            handoff.clone(),
            BdAddr::ANY,
            Duration::from_secs(1800),
        );
        let mut server = PairingServer::bind(coordinator, 10, PairingPolicy::default()).unwrap();

        transport.incoming(ChannelRole::Control, pad_addr());
        transport.incoming(ChannelRole::Interrupt, pad_addr());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });
        let stats = server.run(&cancel).await;

        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.failures, 0);

        let calls = handoff.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].channels_open);
        assert_eq!(calls[0].remote, pad_addr());
        assert_eq!(calls[0].metadata.name, "TestPad");
        assert_eq!(calls[0].metadata.idle_timeout.as_secs(), 1800);
        assert_eq!(calls[0].metadata.descriptor, test_pad().descriptor);

        assert_eq!(transport.open_channels(), 0);
        assert_eq!(server.state(), PairingState::Idle);
    }

    // Scenario B: direct connect, interrupt channel refused.
    #[tokio::test]
    async fn direct_connect_interrupt_failure() {
        let transport = MockTransport::new(BdAddr::ANY);
        transport.refuse(pad_addr(), ChannelRole::Interrupt);
        let handoff = RecordingHandoff::new();
        let scans = Arc::new(Mutex::new(0));

        let daemon = Daemon::new(
            transport.clone(),
            StaticResolver::ok(test_pad()),
            handoff.clone(),
            recorded_scan(Vec::new(), Arc::clone(&scans)),
            Settings::default(),
        );
        let err = daemon
            .run(Mode::Connect(pad_addr()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Transport(_)));
        assert_ne!(err.exit_code(), 0);
        assert_eq!(
            transport.connect_log(),
            vec![
                (pad_addr(), ChannelRole::Control),
                (pad_addr(), ChannelRole::Interrupt)
            ]
        );
        assert_eq!(transport.open_channels(), 0);
        assert!(handoff.calls().is_empty());
        assert_eq!(*scans.lock().unwrap(), 0);
    }

    // Scenario C: the scan comes back empty.
    #[tokio::test]
    async fn search_without_results() {
        let transport = MockTransport::new(BdAddr::ANY);
        let scans = Arc::new(Mutex::new(0));

        let daemon = Daemon::new(
            transport.clone(),
            StaticResolver::ok(test_pad()),
            RecordingHandoff::new(),
            recorded_scan(Vec::new(), Arc::clone(&scans)),
            Settings::default(),
        );
        let err = daemon
            .run(Mode::Search, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Discovery(DiscoveryError::NoDevices)));
        assert_eq!(err.exit_code(), 5);
        assert_eq!(*scans.lock().unwrap(), 1);
        assert!(transport.connect_log().is_empty());
    }

    #[tokio::test]
    async fn search_pairs_only_hid_peripherals() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let phone: BdAddr = "00:1F:20:0A:0B:0D".parse().unwrap();

        let daemon = Daemon::new(
            transport.clone(),
            StaticResolver::ok(test_pad()),
            handoff.clone(),
            recorded_scan(
                vec![
                    InquiryResponse::new(phone, DeviceClass::new([0x0c, 0x02, 0x5a])),
                    InquiryResponse::new(pad_addr(), DeviceClass::new([0x08, 0x25, 0x00])),
                ],
                Arc::default(),
            ),
            Settings::default(),
        );
        daemon
            .run(Mode::Search, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handoff.calls().len(), 1);
        assert_eq!(handoff.calls()[0].remote, pad_addr());
        assert!(transport.connect_log().iter().all(|(addr, _)| *addr == pad_addr()));
        assert_eq!(transport.open_channels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn server_mode_runs_until_cancelled() {
        let transport = MockTransport::new(BdAddr::ANY);
        let handoff = RecordingHandoff::new();
        let daemon = Daemon::new(
            transport.clone(),
            StaticResolver::ok(test_pad()),
            handoff.clone(),
            recorded_scan(Vec::new(), Arc::default()),
            Settings {
                policy: PairingPolicy::Immediate,
                ..Settings::default()
            },
        );

        transport.incoming(ChannelRole::Interrupt, pad_addr());
        transport.incoming(ChannelRole::Control, pad_addr());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        daemon.run(Mode::Server, &cancel).await.unwrap();

        assert_eq!(handoff.calls().len(), 1);
        assert_eq!(transport.open_channels(), 0);
    }
}
