//! Sensor reads and actuator commands against a scripted board.

use std::time::{Duration, Instant};

use feeder_core::mocks::ScriptedTransport;
use feeder_core::{Feeder, FeederError, SensorChannel, SensorReading, Timing};
use feeder_traits::clock::ManualClock;
use rstest::rstest;

fn timing() -> Timing {
    Timing {
        sensor: Duration::from_secs(2),
        calibration: Duration::from_secs(5),
        read_slice: Duration::from_millis(100),
    }
}

type Manual = (
    Feeder<ScriptedTransport<ManualClock>, ManualClock>,
    ScriptedTransport<ManualClock>,
    ManualClock,
);

fn manual(
    script: impl FnOnce(ScriptedTransport<ManualClock>) -> ScriptedTransport<ManualClock>,
) -> Manual {
    let clock = ManualClock::new();
    let transport = script(ScriptedTransport::with_clock(clock.clone()));
    let feeder = Feeder::with_clock(transport.clone(), clock.clone(), timing());
    (feeder, transport, clock)
}

#[rstest]
#[case(SensorChannel::PesoA, "PESO_A: 123.45 g", "123.45 g")]
#[case(SensorChannel::PesoB, "PESO_B => 17.2", "17.2")]
#[case(SensorChannel::DistanciaA, "DISTANCIA_A: 42 cm", "42 cm")]
#[case(SensorChannel::DistanciaB, "DISTANCIA_B:7", "7")]
fn matching_line_returns_value(
    #[case] channel: SensorChannel,
    #[case] line: &str,
    #[case] value: &str,
) {
    let (feeder, transport, _clock) = manual(|t| t.reply(line));
    let reading = feeder.read_sensor(channel).unwrap();
    assert_eq!(
        reading,
        SensorReading::Value {
            channel,
            value: value.to_string()
        }
    );
    assert_eq!(transport.written(), vec![channel.code()]);
}

#[test]
fn silent_board_is_no_response_at_deadline() {
    let (feeder, transport, clock) = manual(|t| t);
    let reading = feeder.read_sensor(SensorChannel::PesoA).unwrap();
    assert_eq!(
        reading,
        SensorReading::NoResponse {
            channel: SensorChannel::PesoA
        }
    );
    assert_eq!(clock.elapsed(), Duration::from_secs(2));
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.closes(), 1);
}

#[test]
fn silent_board_returns_within_timeout_plus_epsilon() {
    let transport = ScriptedTransport::new();
    let feeder = Feeder::new(
        transport,
        Timing {
            sensor: Duration::from_millis(200),
            calibration: Duration::from_millis(200),
            read_slice: Duration::from_millis(20),
        },
    );
    let start = Instant::now();
    let reading = feeder.read_sensor(SensorChannel::DistanciaB).unwrap();
    let elapsed = start.elapsed();
    assert!(matches!(reading, SensorReading::NoResponse { .. }));
    assert!(elapsed >= Duration::from_millis(190), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "overran: {elapsed:?}");
}

#[test]
fn reply_before_deadline_is_accepted() {
    let (feeder, _t, clock) =
        manual(|t| t.pause(Duration::from_millis(1500)).reply("PESO_B: 33 g"));
    let reading = feeder.read_sensor(SensorChannel::PesoB).unwrap();
    assert!(matches!(reading, SensorReading::Value { .. }));
    assert_eq!(clock.elapsed(), Duration::from_millis(1500));
}

#[test]
fn reply_after_deadline_is_ignored() {
    let (feeder, transport, _clock) =
        manual(|t| t.pause(Duration::from_millis(2500)).reply("PESO_B: 33 g"));
    let reading = feeder.read_sensor(SensorChannel::PesoB).unwrap();
    assert!(matches!(reading, SensorReading::NoResponse { .. }));
    assert_eq!(transport.pending(), 1);
}

#[test]
fn unrelated_lines_are_skipped() {
    let (feeder, _t, _c) = manual(|t| {
        t.reply("PESO_B: 12 g")
            .reply("HX711 listo")
            .reply("PESO_A: 99 g")
    });
    let reading = feeder.read_sensor(SensorChannel::PesoA).unwrap();
    assert_eq!(
        reading,
        SensorReading::Value {
            channel: SensorChannel::PesoA,
            value: "99 g".into()
        }
    );
}

#[test]
fn stale_input_is_discarded_before_request() {
    let (feeder, _t, _c) = manual(|t| t.stale("PESO_A: 1 g").reply("PESO_A: 2 g"));
    let reading = feeder.read_sensor(SensorChannel::PesoA).unwrap();
    assert_eq!(
        reading,
        SensorReading::Value {
            channel: SensorChannel::PesoA,
            value: "2 g".into()
        }
    );
}

#[test]
fn open_failure_is_connection_error() {
    let (feeder, transport, _c) = manual(|t| t.fail_open("no such device /dev/ttyAMA10"));
    let err = feeder.read_sensor(SensorChannel::PesoA).unwrap_err();
    assert!(matches!(err, FeederError::Connection(ref m) if m.contains("ttyAMA10")));
    assert_eq!(transport.opens(), 0);
    assert!(transport.written().is_empty());
}

#[rstest]
#[case::write(ScriptedTransport::with_clock(ManualClock::new()).fail_write("broken pipe"))]
#[case::read(ScriptedTransport::with_clock(ManualClock::new()).fail_read("framing error"))]
fn link_is_released_on_io_failure(#[case] transport: ScriptedTransport<ManualClock>) {
    let feeder = Feeder::with_clock(transport.clone(), ManualClock::new(), timing());
    let err = feeder.read_sensor(SensorChannel::PesoA).unwrap_err();
    assert!(matches!(err, FeederError::Hardware(_)));
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.closes(), 1);
}

#[test]
fn read_timeout_text_maps_to_timeout() {
    let (feeder, transport, _c) = manual(|t| t.fail_read("uart read timeout"));
    let err = feeder.read_sensor(SensorChannel::PesoA).unwrap_err();
    assert_eq!(err, FeederError::Timeout);
    assert_eq!(transport.closes(), 1);
}

#[test]
fn every_call_opens_and_closes_its_own_link() {
    let (feeder, transport, _c) = manual(|t| t.reply("PESO_A: 5 g"));
    feeder.read_sensor(SensorChannel::PesoA).unwrap();
    feeder.read_sensor(SensorChannel::PesoA).unwrap();
    feeder.activate_motor().unwrap();
    feeder.activate_pump().unwrap();
    assert_eq!(transport.opens(), 4);
    assert_eq!(transport.closes(), 4);
}

#[test]
fn actuators_write_one_byte_and_wait_for_nothing() {
    let (feeder, transport, clock) = manual(|t| t);
    feeder.activate_motor().unwrap();
    feeder.activate_pump().unwrap();
    assert_eq!(transport.written(), b"rb".to_vec());
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn actuator_write_failure_surfaces() {
    let (feeder, transport, _c) = manual(|t| t.fail_write("device reset"));
    assert!(feeder.activate_motor().is_err());
    assert_eq!(transport.closes(), 1);
}
