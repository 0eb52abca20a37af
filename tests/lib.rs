#[cfg(test)]
mod tests {
    use core::time::Duration;
    use pdomap::{
        config::FieldsConfig,
        domain::DomainPlan,
        fields::{self, FieldWidth, LogicalField},
        link::{DeviceId, DeviceState, MasterLink},
        mapping::{self, SyncDirection},
        monitor::{StateMonitor, Stop, WaitState},
        reader::SdoReader,
        sdo::{self, Object, PdoEntry},
        sim::SimSlave,
        MappingError,
        };

    fn device() -> DeviceId {
        DeviceId {alias: 0, position: 0, vendor: 0x6c, product: 0xa72c}
    }

    fn byte_entries(index: u16, count: usize) -> Vec<PdoEntry> {
        (0 .. count).map(|i| PdoEntry::new(index, (i + 1) as u8, 8)).collect()
    }

    /// a servo-drive-like device: one output PDO of 62 bytes, one input PDO of 234 bytes
    async fn servo() -> SimSlave {
        let sim = SimSlave::new();
        sim.install_assignment(sdo::RX_ASSIGN, &[0x1600]).await;
        sim.install_mapping(0x1600, &byte_entries(0x7000, 62)).await;
        sim.install_assignment(sdo::TX_ASSIGN, &[0x1a00]).await;
        sim.install_mapping(0x1a00, &byte_entries(0x6000, 234)).await;
        sim
    }

    #[tokio::test]
    async fn full_pipeline() {
        let _ = env_logger::builder().is_test(true).try_init();
        let sim = servo().await;
        let device = device();
        let reader = SdoReader::default();

        let layout = mapping::discover(&reader, &sim, &device).await.unwrap();
        assert_eq!(layout.outputs[0].entries.len(), 62);
        assert_eq!(layout.inputs[0].entries.len(), 234);

        let slots = mapping::sync_layout(&layout);
        sim.configure_sync(&device, &slots).await.unwrap();
        let applied = sim.applied_sync().await.unwrap();
        assert_eq!(applied[2].direction, SyncDirection::Write);
        assert_eq!(applied[3].pdos[0].index, 0x1a00);

        let plan = DomainPlan::build(&device, &layout).unwrap();
        assert_eq!(plan.len(), 62 + 234);
        assert_eq!(plan.rx_count(), 62);

        let domain = plan.activate(&sim).await.unwrap();
        assert_eq!(domain.len(), 296);
        assert_eq!(domain.offset(0).unwrap().byte, 0);
        assert_eq!(domain.offset(295).unwrap().byte, 295);

        // a u16 field at byte 10 of the input image lands after the 62 output bytes
        let fields = [LogicalField {name: "X".into(), offset: 10, width: FieldWidth::U16}];
        let resolved = fields::resolve(&fields, &domain, domain.rx_count());
        assert!(resolved[0].valid);
        assert_eq!(resolved[0].offsets, [72, 73]);

        sim.feed_image(72, &[0x34, 0x12]).await;
        assert_eq!(resolved[0].decode(&sim.image().await), 0x1234);
    }

    #[tokio::test]
    async fn discovery_is_deterministic() {
        let sim = servo().await;
        let reader = SdoReader::default();
        let first = mapping::discover(&reader, &sim, &device()).await.unwrap();
        let second = mapping::discover(&reader, &sim, &device()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn assignment_order_is_preserved() {
        let sim = SimSlave::new();
        // deliberately not in numeric order: the slave's order wins
        sim.install_assignment(sdo::TX_ASSIGN, &[0x1a02, 0x1a00, 0x1a01]).await;
        for index in [0x1a00, 0x1a01, 0x1a02] {
            sim.install_mapping(index, &byte_entries(0x6000, 1)).await;
        }
        sim.install_assignment(sdo::RX_ASSIGN, &[0x1600]).await;
        sim.install_mapping(0x1600, &byte_entries(0x7000, 1)).await;

        let layout = mapping::discover(&SdoReader::default(), &sim, &device()).await.unwrap();
        let indices: Vec<_> = layout.inputs.iter().map(|pdo| pdo.index).collect();
        assert_eq!(indices, [0x1a02, 0x1a00, 0x1a01]);
    }

    #[tokio::test]
    async fn oversized_assignment_is_an_error() {
        let sim = servo().await;
        sim.install_assignment_count(sdo::RX_ASSIGN, 20, 1).await;
        let result = mapping::read_assignment(&SdoReader::default(), &sim, &device(), sdo::RX_ASSIGN).await;
        // 20 declared PDOs must never come back truncated to 16
        match result {
            Err(MappingError::CapacityExceeded {count: 20, max: 16, ..}) => (),
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_assignment_is_an_error() {
        let sim = servo().await;
        sim.install_assignment_count(sdo::TX_ASSIGN, 0, 1).await;
        let result = mapping::read_assignment(&SdoReader::default(), &sim, &device(), sdo::TX_ASSIGN).await;
        assert!(matches!(result, Err(MappingError::NoAssignment(_))));
    }

    #[tokio::test]
    async fn empty_mapping_is_an_error() {
        let sim = SimSlave::new();
        sim.install_assignment(sdo::RX_ASSIGN, &[0x1600]).await;
        sim.install_mapping(0x1600, &[]).await;
        let result = mapping::read_pdo(&SdoReader::default(), &sim, &device(), sdo::PdoMapping {index: 0x1600}).await;
        assert!(matches!(result, Err(MappingError::EmptyMapping(0x1600))));
    }

    #[tokio::test]
    async fn count_reply_widths_are_tolerated() {
        for width in [1, 2, 4] {
            let sim = SimSlave::new();
            sim.install_assignment_count(sdo::RX_ASSIGN, 1, width).await;
            sim.insert(sdo::RX_ASSIGN.slot(0), &0x1600u16.to_le_bytes()).await;
            sim.install_mapping(0x1600, &byte_entries(0x7000, 2)).await;
            let pdos = mapping::read_assignment(&SdoReader::default(), &sim, &device(), sdo::RX_ASSIGN).await.unwrap();
            assert_eq!(&pdos[..], [0x1600]);
        }
    }

    #[tokio::test]
    async fn mapping_word_width_is_strict() {
        let sim = SimSlave::new();
        sim.insert(Object::count(0x1600), &[1]).await;
        // a 2 byte reply where the 32 bit mapping word is expected
        sim.insert(Object::slot(0x1600, 0), &[0x00, 0x70]).await;
        let result = mapping::read_pdo(&SdoReader::default(), &sim, &device(), sdo::PdoMapping {index: 0x1600}).await;
        assert!(matches!(result, Err(MappingError::SizeMismatch {size: 2, ..})));
    }

    #[tokio::test]
    async fn slow_mailbox_times_out() {
        let sim = servo().await;
        sim.set_latency(1000).await;
        let reader = SdoReader::new(5, Duration::from_micros(100));
        let result = reader.read_count(&sim, &device(), sdo::RX_ASSIGN.count()).await;
        assert!(matches!(result, Err(MappingError::Timeout(_))));
    }

    #[tokio::test]
    async fn upload_survives_its_latency() {
        let sim = servo().await;
        sim.set_latency(3).await;
        let reader = SdoReader::new(10, Duration::from_micros(100));
        let count = reader.read_count(&sim, &device(), sdo::RX_ASSIGN.count()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn registration_of_nothing_fails() {
        let sim = SimSlave::new();
        let plan = DomainPlan::build(&device(), &Default::default()).unwrap();
        assert!(plan.is_empty());
        assert!(matches!(plan.activate(&sim).await, Err(MappingError::Registration(_))));
    }

    #[tokio::test]
    async fn wait_reaches_target_state() {
        let sim = SimSlave::new();
        sim.schedule_state(DeviceState::PreOperational, 3).await;
        let monitor = StateMonitor::new(Duration::from_millis(1), Stop::new());
        let outcome = monitor
            .wait_for_state(&sim, &device(), DeviceState::PreOperational, Duration::from_millis(200))
            .await.unwrap();
        assert_eq!(outcome, WaitState::Ready(DeviceState::PreOperational));
        assert!(sim.cycles().await >= 3);
    }

    #[tokio::test]
    async fn wait_times_out_but_keeps_pumping() {
        let sim = SimSlave::new();
        sim.schedule_state(DeviceState::PreOperational, 1).await;
        let monitor = StateMonitor::new(Duration::from_millis(1), Stop::new());
        let outcome = monitor
            .wait_for_state(&sim, &device(), DeviceState::Operational, Duration::from_millis(20))
            .await.unwrap();
        assert_eq!(outcome, WaitState::TimedOut(DeviceState::PreOperational));
        // the exchange must have been running during the whole wait
        assert!(sim.cycles().await > 10);
    }

    #[tokio::test]
    async fn wait_can_be_cancelled() {
        let sim = SimSlave::new();
        let stop = Stop::new();
        stop.trigger();
        let monitor = StateMonitor::new(Duration::from_millis(1), stop);
        let outcome = monitor
            .wait_for_state(&sim, &device(), DeviceState::Operational, Duration::from_secs(10))
            .await.unwrap();
        assert_eq!(outcome, WaitState::Cancelled(DeviceState::Unknown));
    }

    #[tokio::test]
    async fn cyclic_run_is_bounded_and_cancellable() {
        let sim = SimSlave::new();
        let monitor = StateMonitor::new(Duration::from_micros(100), Stop::new());
        assert_eq!(monitor.run(&sim, |cycle| cycle < 5).await.unwrap(), 5);

        let stop = monitor.stop.clone();
        let ran = monitor.run(&sim, move |cycle| {
            if cycle == 3 {stop.trigger()}
            true
        }).await.unwrap();
        assert_eq!(ran, 3);
    }

    #[tokio::test]
    async fn static_config_feeds_the_same_pipeline() {
        let sim = SimSlave::new();
        let config = pdomap::config::SessionConfig::parse(r#"{
            "defaults": {"vendor_id": "0x6c", "product_code": "0xa72c"},
            "slaves": [{
                "sm2": {"pdo_index": "0x1600", "entry_index": "0x7000", "size_bytes": 4},
                "sm3": {"pdo_index": "0x1A00", "entry_index": "0x6000", "size_bytes": 6}
            }]
        }"#).unwrap();
        let slave = &config.slaves[0];
        let plan = DomainPlan::build(&slave.device(&config.defaults), &slave.layout()).unwrap();
        assert_eq!((plan.len(), plan.rx_count()), (10, 4));
        let domain = plan.activate(&sim).await.unwrap();

        let fields = FieldsConfig::parse(r#"{
            "fields": {"slave0": {"sm3": [
                {"name": "value", "offset": 1, "type": "u32"},
                {"name": "off_the_end", "offset": 5, "type": "u16"}
            ]}}
        }"#).unwrap();
        let resolved = fields::resolve(&fields.input_fields(), &domain, domain.rx_count());
        assert!(resolved[0].valid);
        assert_eq!(resolved[0].offsets, [5, 6, 7, 8]);
        // out-of-range fields degrade alone, the session carries on
        assert!(! resolved[1].valid);
    }
}
