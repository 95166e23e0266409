#![no_main]
use feeder_core::protocol::{ResponseLine, is_calibrated_line, is_ready_line, parse_factor};
use feeder_core::{SensorChannel, TimeOfDay};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let parsed = ResponseLine::parse(data);
    if let ResponseLine::Reading { channel, value } = &parsed {
        assert!(!value.is_empty());
        assert_eq!(parsed.value_for(*channel), Some(value.as_str()));
        assert!(data.contains(channel.tag()));
    }
    for channel in SensorChannel::ALL {
        let _ = parsed.value_for(channel);
    }
    let _ = is_ready_line(data);
    let _ = is_calibrated_line(data);
    let _ = parse_factor(data);

    // Accepted times always print back as the same text.
    if let Ok(t) = data.parse::<TimeOfDay>() {
        assert_eq!(t.to_string(), data);
    }
});
