//! The discovery state machine
//!
//! [`DiscoveryEngine`] walks the bus in four stages — poll, physical
//! address, OSD name, vendor ID — keeping exactly one query
//! outstanding at a time and matching replies positionally against
//! the device currently at the head of the walk. See the crate docs
//! for the host-integration contract.

use crate::bus::{BusGateway, LocalDevice, PollFlags};
use crate::cache::MessageCache;
use crate::debug;
use crate::{DeviceInfo, DiscoveryCallback, DiscoveryConfig, DiscoveryState};
use alloc::string::String;
use alloc::vec::Vec;
use twill_cec::message;
use twill_cec::{
    CecFrame, DeviceType, LogicalAddress, Opcode, PhysicalAddress, PortId,
    VendorId,
};

/// In-progress inventory entry for one acked logical address
///
/// Starts as nothing but the address; each stage fills in one more
/// attribute, or leaves its default behind.
#[derive(Debug)]
struct DeviceRecord {
    logical_address: LogicalAddress,
    physical_address: PhysicalAddress,
    port_id: PortId,
    device_type: DeviceType,
    vendor_id: VendorId,
    display_name: String,
}

impl DeviceRecord {
    fn new(logical_address: LogicalAddress) -> Self {
        Self {
            logical_address,
            physical_address: PhysicalAddress::INVALID,
            port_id: PortId::INVALID,
            device_type: DeviceType::INACTIVE,
            vendor_id: VendorId::UNKNOWN,
            display_name: String::new(),
        }
    }

    fn to_device_info(&self) -> DeviceInfo {
        DeviceInfo {
            logical_address: self.logical_address,
            physical_address: self.physical_address,
            port_id: self.port_id,
            device_type: self.device_type,
            vendor_id: self.vendor_id,
            display_name: self.display_name.clone(),
        }
    }
}

/// One run of device discovery
///
/// Construct with the local device's own logical address and the
/// one-shot completion callback, call [`DiscoveryEngine::start`], and
/// feed in poll results, inbound frames, and timer expiries as they
/// happen. The engine is single-use: once the callback has fired (or
/// [`DiscoveryEngine::cancel`] has run) it stays
/// [`Finished`](DiscoveryState::Finished), and a new run needs a new
/// engine.
pub struct DiscoveryEngine<CB: DiscoveryCallback> {
    source: LogicalAddress,
    config: DiscoveryConfig,
    state: DiscoveryState,
    devices: Vec<DeviceRecord>,
    processed_device_count: usize,
    timeout_retries: u8,
    callback: Option<CB>,
}

impl<CB: DiscoveryCallback> DiscoveryEngine<CB> {
    /// Create an engine with the default [`DiscoveryConfig`]
    ///
    /// `source` is the logical address the engine's queries are sent
    /// from, i.e. the local device's own address.
    #[must_use]
    pub fn new(source: LogicalAddress, callback: CB) -> Self {
        Self::with_config(source, callback, DiscoveryConfig::default())
    }

    /// Create an engine with explicit tunables
    #[must_use]
    pub fn with_config(
        source: LogicalAddress,
        callback: CB,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            source,
            config,
            state: DiscoveryState::Idle,
            devices: Vec::new(),
            processed_device_count: 0,
            timeout_retries: 0,
            callback: Some(callback),
        }
    }

    /// Where the run currently is
    #[must_use]
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Begin discovery by requesting the bus polling sweep
    ///
    /// The sweep runs remote addresses only, in reverse order, so
    /// that the TV (address 0) — the device most likely to be mid
    /// power-up — is polled last. Returns `true`: starting is always
    /// accepted.
    pub fn start<G: BusGateway>(&mut self, gateway: &G) -> bool {
        self.devices.clear();
        self.state = DiscoveryState::Polling;
        gateway.poll_devices(
            PollFlags::REVERSE_ORDER | PollFlags::REMOTES_ONLY,
            self.config.poll_retries,
        );
        true
    }

    /// The polling sweep finished; `acked` answered, in sweep order
    ///
    /// An empty ack list is a successful, empty discovery. Ignored
    /// unless a sweep is actually outstanding, so a late result from
    /// an abandoned run cannot restart a finished engine.
    pub fn on_poll_complete<G: BusGateway, L: LocalDevice>(
        &mut self,
        acked: &[LogicalAddress],
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        if self.state != DiscoveryState::Polling {
            return;
        }
        if acked.is_empty() {
            debug::println!("discovery: no device detected");
            self.wrap_up(gateway, local);
            return;
        }
        debug::println!("discovery: {} device(s) acked", acked.len());
        for address in acked {
            self.devices.push(DeviceRecord::new(*address));
        }
        self.start_stage(DiscoveryState::PhysicalAddress, cache, gateway, local);
    }

    /// An inbound frame arrived; returns whether discovery consumed it
    ///
    /// The host calls this for every frame and routes the ones that
    /// return `false` to its other features. A frame is consumed when
    /// it is the kind of reply the current stage is waiting for, even
    /// if it then turns out to come from the wrong device and is
    /// dropped.
    pub fn on_command<G: BusGateway, L: LocalDevice>(
        &mut self,
        frame: &CecFrame,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) -> bool {
        self.dispatch(frame, cache, gateway, local)
    }

    /// The pending timeout fired
    ///
    /// `state` is the tag the timeout was armed with; a tag that no
    /// longer matches the engine's state is stale (the reply won the
    /// race) and is ignored.
    pub fn on_timer<G: BusGateway, L: LocalDevice>(
        &mut self,
        state: DiscoveryState,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        if state != self.state || !self.in_query_stage() {
            return;
        }
        self.timeout_retries += 1;
        if self.timeout_retries < self.config.query_retries {
            self.resend_query(gateway);
            return;
        }
        self.timeout_retries = 0;
        debug::println!(
            "discovery: timeout in {:?} stage at index {}",
            self.state,
            self.processed_device_count
        );
        if self.processed_device_count < self.devices.len() {
            // Drop the silent device; the next one shifts down into
            // this index, so the walk does not advance.
            let removed = self.devices.remove(self.processed_device_count);
            debug::println!(
                "discovery: dropping silent device {:?}",
                removed.logical_address
            );
        }
        self.check_and_proceed(cache, gateway, local);
    }

    /// Abandon the run without reporting a result
    ///
    /// The pending timeout is cleared and the completion callback is
    /// dropped unfired.
    pub fn cancel<G: BusGateway>(&mut self, gateway: &G) {
        gateway.clear_timer();
        self.state = DiscoveryState::Finished;
        self.callback = None;
        self.devices.clear();
    }

    fn in_query_stage(&self) -> bool {
        matches!(
            self.state,
            DiscoveryState::PhysicalAddress
                | DiscoveryState::OsdName
                | DiscoveryState::VendorId
        )
    }

    fn start_stage<G: BusGateway, L: LocalDevice>(
        &mut self,
        stage: DiscoveryState,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        debug::println!(
            "discovery: start {:?} stage, {} device(s)",
            stage,
            self.devices.len()
        );
        self.processed_device_count = 0;
        self.state = stage;
        self.check_and_proceed(cache, gateway, local);
    }

    fn check_and_proceed<G: BusGateway, L: LocalDevice>(
        &mut self,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        if self.devices.is_empty() {
            self.wrap_up(gateway, local);
            return;
        }
        if self.processed_device_count == self.devices.len() {
            match self.state {
                DiscoveryState::PhysicalAddress => self.start_stage(
                    DiscoveryState::OsdName,
                    cache,
                    gateway,
                    local,
                ),
                DiscoveryState::OsdName => self.start_stage(
                    DiscoveryState::VendorId,
                    cache,
                    gateway,
                    local,
                ),
                DiscoveryState::VendorId => self.wrap_up(gateway, local),
                _ => {}
            }
        } else {
            self.send_query(cache, gateway, local);
        }
    }

    /// The expected-reply opcode and request builder for the current
    /// stage's query
    fn stage_query(
        &self,
    ) -> Option<(Opcode, fn(LogicalAddress, LogicalAddress) -> CecFrame)>
    {
        match self.state {
            DiscoveryState::PhysicalAddress => Some((
                Opcode::REPORT_PHYSICAL_ADDRESS,
                message::build_give_physical_address,
            )),
            DiscoveryState::OsdName => Some((
                Opcode::SET_OSD_NAME,
                message::build_give_osd_name,
            )),
            DiscoveryState::VendorId => Some((
                Opcode::DEVICE_VENDOR_ID,
                message::build_give_device_vendor_id,
            )),
            DiscoveryState::Idle
            | DiscoveryState::Polling
            | DiscoveryState::Finished => None,
        }
    }

    /// Issue the current query for the first time: skip unaddressable
    /// targets, try the cache, otherwise send and arm the timeout
    fn send_query<G: BusGateway, L: LocalDevice>(
        &mut self,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        let target = self.devices[self.processed_device_count].logical_address;
        let Some((reply, build)) = self.stage_query() else {
            return;
        };

        if !target.is_addressable() {
            // A directed query cannot reach this address. Skip past
            // the record rather than spinning on it.
            debug::println!(
                "discovery: skipping unaddressable {:?}",
                target
            );
            self.advance();
            self.check_and_proceed(cache, gateway, local);
            return;
        }

        gateway.clear_timer();

        // A device that already volunteered the answer need not be
        // asked again.
        if let Some(frame) = cache.get(target, reply) {
            let frame = frame.clone();
            self.dispatch(&frame, cache, gateway, local);
            return;
        }

        self.transmit_query(target, build, gateway);
    }

    /// Re-send the current query after a timeout
    ///
    /// Straight back to the wire: the cache belongs to the initial
    /// issue only. Whatever arrived since the first send either was
    /// the reply (and the timer would be stale) or was not, in which
    /// case asking the device again is the point of the retry.
    fn resend_query<G: BusGateway>(&mut self, gateway: &G) {
        let target = self.devices[self.processed_device_count].logical_address;
        let Some((_, build)) = self.stage_query() else {
            return;
        };
        self.transmit_query(target, build, gateway);
    }

    /// Put a query on the wire and arm its timeout
    fn transmit_query<G: BusGateway>(
        &self,
        target: LogicalAddress,
        build: fn(LogicalAddress, LogicalAddress) -> CecFrame,
        gateway: &G,
    ) {
        let _ = gateway.send_frame(&build(self.source, target));
        gateway.arm_timer(self.state, self.config.query_timeout);
    }

    fn dispatch<G: BusGateway, L: LocalDevice>(
        &mut self,
        frame: &CecFrame,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) -> bool {
        match self.state {
            DiscoveryState::PhysicalAddress => {
                if frame.opcode == Opcode::REPORT_PHYSICAL_ADDRESS {
                    self.handle_report_physical_address(
                        frame, cache, gateway, local,
                    );
                    return true;
                }
                // A <Feature Abort> here is left to the timeout path:
                // a physical address is not something a device can
                // decline to have.
                false
            }
            DiscoveryState::OsdName => {
                if frame.opcode == Opcode::SET_OSD_NAME
                    || Self::aborts(frame, Opcode::GIVE_OSD_NAME)
                {
                    self.handle_set_osd_name(frame, cache, gateway, local);
                    return true;
                }
                false
            }
            DiscoveryState::VendorId => {
                if frame.opcode == Opcode::DEVICE_VENDOR_ID
                    || Self::aborts(frame, Opcode::GIVE_DEVICE_VENDOR_ID)
                {
                    self.handle_device_vendor_id(
                        frame, cache, gateway, local,
                    );
                    return true;
                }
                false
            }
            DiscoveryState::Idle
            | DiscoveryState::Polling
            | DiscoveryState::Finished => false,
        }
    }

    /// Is `frame` a \<Feature Abort\> rejecting `request`?
    fn aborts(frame: &CecFrame, request: Opcode) -> bool {
        frame.opcode == Opcode::FEATURE_ABORT
            && message::feature_abort_target(&frame.params) == Some(request)
    }

    /// The index of the device the walk is waiting on, if `frame`
    /// really is its reply; replies are matched positionally
    fn matched_index(&self, frame: &CecFrame) -> Option<usize> {
        let current = self.devices.get(self.processed_device_count)?;
        if current.logical_address != frame.source {
            debug::println!(
                "discovery: unmatched reply source, expected {:?} got {:?}",
                current.logical_address,
                frame.source
            );
            return None;
        }
        Some(self.processed_device_count)
    }

    fn handle_report_physical_address<G: BusGateway, L: LocalDevice>(
        &mut self,
        frame: &CecFrame,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        let Some(index) = self.matched_index(frame) else {
            return;
        };
        let report = match message::parse_physical_address_report(
            &frame.params,
        ) {
            Ok(report) => report,
            Err(e) => {
                debug::println!(
                    "discovery: bad physical-address payload: {:?}",
                    e
                );
                return;
            }
        };

        let port_id = local.port_id_of(report.physical_address);
        let current = &mut self.devices[index];
        current.physical_address = report.physical_address;
        current.device_type = report.device_type;
        current.port_id = port_id;
        current.display_name = report.device_type.default_name().into();
        let logical = current.logical_address;

        local.on_switch_discovered(
            logical,
            report.device_type,
            report.physical_address,
        );
        self.advance();
        self.check_and_proceed(cache, gateway, local);
    }

    fn handle_set_osd_name<G: BusGateway, L: LocalDevice>(
        &mut self,
        frame: &CecFrame,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        let Some(index) = self.matched_index(frame) else {
            return;
        };
        let current = &mut self.devices[index];
        current.display_name = if frame.opcode == Opcode::FEATURE_ABORT {
            current.logical_address.default_device_name().into()
        } else {
            match message::parse_osd_name(&frame.params) {
                Ok(name) => name,
                Err(e) => {
                    debug::println!(
                        "discovery: failed to decode OSD name: {:?}",
                        e
                    );
                    current.logical_address.default_device_name().into()
                }
            }
        };
        self.advance();
        self.check_and_proceed(cache, gateway, local);
    }

    fn handle_device_vendor_id<G: BusGateway, L: LocalDevice>(
        &mut self,
        frame: &CecFrame,
        cache: &MessageCache,
        gateway: &G,
        local: &mut L,
    ) {
        let Some(index) = self.matched_index(frame) else {
            return;
        };
        if frame.opcode != Opcode::FEATURE_ABORT {
            match message::parse_device_vendor_id(&frame.params) {
                Ok(vendor_id) => self.devices[index].vendor_id = vendor_id,
                Err(e) => {
                    debug::println!(
                        "discovery: bad vendor-id payload: {:?}",
                        e
                    );
                    return;
                }
            }
        }

        // Vendor ID is the last stage: this device is now complete.
        let info = self.devices[index].to_device_info();
        if let Some(callback) = self.callback.as_mut() {
            callback.on_device_discovered(&info);
        }
        self.advance();
        self.check_and_proceed(cache, gateway, local);
    }

    fn advance(&mut self) {
        self.processed_device_count += 1;
        self.timeout_retries = 0;
    }

    fn wrap_up<G: BusGateway, L: LocalDevice>(
        &mut self,
        gateway: &G,
        local: &mut L,
    ) {
        gateway.clear_timer();
        debug::println!(
            "discovery: complete, {} device(s)",
            self.devices.len()
        );
        let result: Vec<DeviceInfo> = self
            .devices
            .iter()
            .map(DeviceRecord::to_device_info)
            .collect();
        self.devices.clear();
        self.state = DiscoveryState::Finished;
        if let Some(callback) = self.callback.take() {
            callback.on_discovery_done(result);
        }
        local.flush_delayed_messages();
    }
}
