//! End-to-end discovery runs against a scripted bus
//!
//! These tests drive the engine purely through its public API: a
//! little bus simulator answers (or refuses, or ignores) each query
//! the engine puts on the wire, and fires the engine's own timer when
//! a scripted device stays silent.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use twill_cec::message;
use twill_cec::{
    CecFrame, DeviceType, LogicalAddress, Opcode, PhysicalAddress, PortId,
    VendorId,
};
use twill_cec_discovery::bus::{BusGateway, LocalDevice, PollFlags};
use twill_cec_discovery::cache::MessageCache;
use twill_cec_discovery::{
    DeviceInfo, DiscoveryCallback, DiscoveryEngine, DiscoveryState,
};

/// How a scripted device behaves when queried
#[derive(Clone)]
enum Behavior {
    /// Answers everything
    Cooperative {
        physical: PhysicalAddress,
        device_type: DeviceType,
        name: &'static str,
        vendor: VendorId,
    },
    /// Acks the poll but never answers a query
    Silent,
    /// Answers the physical-address query, refuses the other two
    Standoffish {
        physical: PhysicalAddress,
        device_type: DeviceType,
    },
}

struct ScriptedBus {
    devices: Vec<(LogicalAddress, Behavior)>,
    outbound: RefCell<VecDeque<CecFrame>>,
    armed: RefCell<Option<DiscoveryState>>,
    polled: RefCell<Option<PollFlags>>,
    sent_frames: RefCell<usize>,
}

impl ScriptedBus {
    fn new(devices: Vec<(u8, Behavior)>) -> Self {
        Self {
            devices: devices
                .into_iter()
                .map(|(a, b)| (LogicalAddress(a), b))
                .collect(),
            outbound: RefCell::new(VecDeque::new()),
            armed: RefCell::new(None),
            polled: RefCell::new(None),
            sent_frames: RefCell::new(0),
        }
    }

    /// Every scripted device acks the polling sweep
    fn acked(&self) -> Vec<LogicalAddress> {
        self.devices.iter().map(|(a, _)| *a).collect()
    }

    fn behavior_of(&self, address: LogicalAddress) -> Option<Behavior> {
        self.devices
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, b)| b.clone())
    }

    /// The reply a scripted device gives to `frame`, if any
    fn reply_to(&self, frame: &CecFrame) -> Option<CecFrame> {
        let from = frame.destination;
        match (self.behavior_of(from)?, frame.opcode) {
            (
                Behavior::Cooperative { physical, device_type, .. }
                | Behavior::Standoffish { physical, device_type },
                Opcode::GIVE_PHYSICAL_ADDRESS,
            ) => Some(message::build_report_physical_address(
                from,
                physical,
                device_type,
            )),
            (
                Behavior::Cooperative { name, .. },
                Opcode::GIVE_OSD_NAME,
            ) => Some(message::build_set_osd_name(from, frame.source, name)),
            (
                Behavior::Cooperative { vendor, .. },
                Opcode::GIVE_DEVICE_VENDOR_ID,
            ) => Some(message::build_device_vendor_id(from, vendor)),
            (Behavior::Standoffish { .. }, opcode) => {
                Some(message::build_feature_abort(
                    from,
                    frame.source,
                    opcode,
                    message::abort_reason::REFUSED,
                ))
            }
            (Behavior::Silent, _) => None,
            _ => None,
        }
    }
}

impl BusGateway for ScriptedBus {
    type Error = ();

    fn send_frame(&self, frame: &CecFrame) -> Result<(), ()> {
        *self.sent_frames.borrow_mut() += 1;
        self.outbound.borrow_mut().push_back(frame.clone());
        Ok(())
    }

    fn poll_devices(&self, flags: PollFlags, _retries: u8) {
        *self.polled.borrow_mut() = Some(flags);
    }

    fn arm_timer(
        &self,
        state: DiscoveryState,
        _timeout: core::time::Duration,
    ) {
        *self.armed.borrow_mut() = Some(state);
    }

    fn clear_timer(&self) {
        *self.armed.borrow_mut() = None;
    }
}

#[derive(Default, Clone)]
struct RecordingCallback {
    result: Rc<RefCell<Option<Vec<DeviceInfo>>>>,
}

impl DiscoveryCallback for RecordingCallback {
    fn on_discovery_done(self, devices: Vec<DeviceInfo>) {
        *self.result.borrow_mut() = Some(devices);
    }
}

struct OnePortTv;

impl LocalDevice for OnePortTv {
    fn port_id_of(&self, physical: PhysicalAddress) -> PortId {
        // everything hangs off input 1 in these scripts
        if physical == PhysicalAddress::INVALID {
            PortId::INVALID
        } else {
            PortId(i32::from((physical.0 >> 12) & 0xF))
        }
    }
}

/// Run discovery to completion against the scripted bus
fn run(bus: &ScriptedBus) -> Vec<DeviceInfo> {
    run_with_cache(bus, &MessageCache::new())
}

fn run_with_cache(
    bus: &ScriptedBus,
    cache: &MessageCache,
) -> Vec<DeviceInfo> {
    let callback = RecordingCallback::default();
    let mut engine =
        DiscoveryEngine::new(LogicalAddress::TV, callback.clone());
    let mut tv = OnePortTv;

    assert!(engine.start(bus));
    assert!(bus
        .polled
        .borrow()
        .expect("start() polls the bus")
        .contains(PollFlags::REMOTES_ONLY));
    engine.on_poll_complete(&bus.acked(), cache, bus, &mut tv);

    for _ in 0..1000 {
        if engine.state() == DiscoveryState::Finished {
            let result = callback.result.borrow_mut().take();
            return result.expect("the done callback fired");
        }
        let next = bus.outbound.borrow_mut().pop_front();
        if let Some(frame) = next {
            if let Some(reply) = bus.reply_to(&frame) {
                assert!(engine.on_command(&reply, cache, bus, &mut tv));
                continue;
            }
        }
        // no reply forthcoming: let the query time out
        let state = bus.armed.borrow().expect("a query armed the timer");
        engine.on_timer(state, cache, bus, &mut tv);
    }
    panic!("discovery did not finish");
}

#[test]
fn empty_bus() {
    let bus = ScriptedBus::new(vec![]);
    let result = run(&bus);
    assert!(result.is_empty());
    assert_eq!(*bus.sent_frames.borrow(), 0);
}

#[test]
fn mixed_bus() {
    let bus = ScriptedBus::new(vec![
        (
            8,
            Behavior::Cooperative {
                physical: PhysicalAddress(0x2000),
                device_type: DeviceType::RECORDING_DEVICE,
                name: "HDD Recorder",
                vendor: VendorId(0x0000F0),
            },
        ),
        (
            5,
            Behavior::Standoffish {
                physical: PhysicalAddress(0x3000),
                device_type: DeviceType::AUDIO_SYSTEM,
            },
        ),
        (3, Behavior::Silent),
        (
            4,
            Behavior::Cooperative {
                physical: PhysicalAddress(0x1000),
                device_type: DeviceType::PLAYBACK_DEVICE,
                name: "Player",
                vendor: VendorId(0x008045),
            },
        ),
    ]);

    let result = run(&bus);

    // the silent device at 3 fell out; everyone else survived, in
    // ack order
    assert_eq!(result.len(), 3);

    assert_eq!(result[0].logical_address, LogicalAddress(8));
    assert_eq!(result[0].display_name, "HDD Recorder");
    assert_eq!(result[0].port_id, PortId(2));
    assert_eq!(result[0].vendor_id, VendorId(0x0000F0));

    // refused both optional queries, so defaults stand in
    assert_eq!(result[1].logical_address, LogicalAddress(5));
    assert_eq!(result[1].physical_address, PhysicalAddress(0x3000));
    assert_eq!(result[1].display_name, "Audio System");
    assert_eq!(result[1].vendor_id, VendorId::UNKNOWN);

    assert_eq!(result[2].logical_address, LogicalAddress(4));
    assert_eq!(result[2].device_type, DeviceType::PLAYBACK_DEVICE);
    assert_eq!(result[2].physical_address, PhysicalAddress(0x1000));
    assert_eq!(result[2].port_id, PortId(1));
}

#[test]
fn warm_cache_needs_no_bus_traffic() {
    let bus = ScriptedBus::new(vec![(
        4,
        Behavior::Cooperative {
            physical: PhysicalAddress(0x1000),
            device_type: DeviceType::PLAYBACK_DEVICE,
            name: "Player",
            vendor: VendorId(0x008045),
        },
    )]);

    let mut cache = MessageCache::new();
    cache.put(message::build_report_physical_address(
        LogicalAddress(4),
        PhysicalAddress(0x1000),
        DeviceType::PLAYBACK_DEVICE,
    ));
    cache.put(message::build_set_osd_name(
        LogicalAddress(4),
        LogicalAddress::TV,
        "Player",
    ));
    cache.put(message::build_device_vendor_id(
        LogicalAddress(4),
        VendorId(0x008045),
    ));

    let result = run_with_cache(&bus, &cache);

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].display_name, "Player");
    assert_eq!(*bus.sent_frames.borrow(), 0);
}

#[test]
fn all_silent_bus_completes_empty() {
    let bus = ScriptedBus::new(vec![
        (3, Behavior::Silent),
        (9, Behavior::Silent),
    ]);
    let result = run(&bus);
    assert!(result.is_empty());
}
