// Licensed under the Apache-2.0 license

use dust_common::protocol::HandshakeOptions;
use log::{debug, error, info, warn};
use smlang::statemachine;

// Define the state machine of the update initiator.
// Transitions only do bookkeeping. Packet I/O is driven by `DustSession`,
// which feeds the outcome of every exchange back in as an event.
statemachine! {
    derive_states: [Debug, Clone, Copy],
    derive_events: [Clone, Debug],
    transitions: {
        *Idle + Connect / on_connect = Connecting,
        Connecting + Connect / on_connect = Connecting,
        Connecting + ConnectAcknowledged(HandshakeOptions) / on_connected = Connected,

        Connected + StartTransfer / on_start_transfer = Transferring,
        Transferring + BatchAcknowledged(u32) / on_batch_acknowledged = Transferring,
        Transferring + BatchRejected(u32) / on_batch_rejected = Transferring,
        Transferring + TransferComplete / on_transfer_complete = Connected,

        Connected + Disconnect / on_disconnect = Disconnecting,
        Transferring + Disconnect / on_disconnect = Disconnecting,
        Disconnecting + Disconnect / on_disconnect = Disconnecting,
        Disconnecting + DisconnectAcknowledged / on_disconnected = Idle,

        _ + Abort / on_abort = Failed
    }
}

pub trait StateMachineActions {
    fn on_connect(&mut self, ctx: &mut InnerContext) -> Result<(), ()> {
        ctx.connect_attempts += 1;
        debug!("Connect attempt {}", ctx.connect_attempts);
        Ok(())
    }
    fn on_connected(
        &mut self,
        ctx: &mut InnerContext,
        options: HandshakeOptions,
    ) -> Result<(), ()> {
        info!(
            "Connected: {} packets of {} bytes, ack every {} packets",
            options.number_of_packets,
            options.payload_size(),
            options.ack_frequency.packet_count()
        );
        ctx.options = Some(options);
        Ok(())
    }
    fn on_start_transfer(&mut self, ctx: &mut InnerContext) -> Result<(), ()> {
        ctx.acknowledged_batches = 0;
        ctx.rejected_batches = 0;
        Ok(())
    }
    fn on_batch_acknowledged(&mut self, ctx: &mut InnerContext, first_packet: u32) -> Result<(), ()> {
        ctx.acknowledged_batches += 1;
        debug!("Batch starting at packet {} acknowledged", first_packet);
        Ok(())
    }
    fn on_batch_rejected(&mut self, ctx: &mut InnerContext, first_packet: u32) -> Result<(), ()> {
        ctx.rejected_batches += 1;
        warn!("Resending batch starting at packet {}", first_packet);
        Ok(())
    }
    fn on_transfer_complete(&mut self, ctx: &mut InnerContext) -> Result<(), ()> {
        info!(
            "Transfer complete: {} batches acknowledged, {} resent",
            ctx.acknowledged_batches, ctx.rejected_batches
        );
        Ok(())
    }
    fn on_disconnect(&mut self, _ctx: &mut InnerContext) -> Result<(), ()> {
        Ok(())
    }
    fn on_disconnected(&mut self, ctx: &mut InnerContext) -> Result<(), ()> {
        info!("Disconnected");
        ctx.options = None;
        ctx.connect_attempts = 0;
        Ok(())
    }
    fn on_abort(&mut self, _ctx: &mut InnerContext) -> Result<(), ()> {
        error!("Session aborted");
        Ok(())
    }
}

pub struct DefaultActions;
impl StateMachineActions for DefaultActions {}

/// Session bookkeeping visible to the actions.
#[derive(Debug, Default, Clone)]
pub struct InnerContext {
    pub connect_attempts: u32,
    /// Options acknowledged by the device, cleared on disconnect.
    pub options: Option<HandshakeOptions>,
    pub acknowledged_batches: u32,
    pub rejected_batches: u32,
}

pub struct Context<T: StateMachineActions> {
    inner: T,
    pub inner_ctx: InnerContext,
}

impl<T: StateMachineActions> Context<T> {
    pub fn new(actions: T) -> Self {
        Self {
            inner: actions,
            inner_ctx: InnerContext::default(),
        }
    }

    pub fn actions(&self) -> &T {
        &self.inner
    }
}

// Delegates the generated actions to the StateMachineActions implementation,
// so callers can override any of them.
macro_rules! delegate_to_inner {
    ($($fn_name:ident ($($arg:ident : $arg_ty:ty),*) -> $ret:ty),* $(,)?) => {
        $(
            fn $fn_name(&mut self, $($arg: $arg_ty),*) -> $ret {
                debug!("Session Action: {}", stringify!($fn_name));
                self.inner.$fn_name(&mut self.inner_ctx, $($arg),*)
            }
        )*
    };
}

impl<T: StateMachineActions> StateMachineContext for Context<T> {
    delegate_to_inner! {
        on_connect() -> Result<(), ()>,
        on_connected(options: HandshakeOptions) -> Result<(), ()>,
        on_start_transfer() -> Result<(), ()>,
        on_batch_acknowledged(first_packet: u32) -> Result<(), ()>,
        on_batch_rejected(first_packet: u32) -> Result<(), ()>,
        on_transfer_complete() -> Result<(), ()>,
        on_disconnect() -> Result<(), ()>,
        on_disconnected() -> Result<(), ()>,
        on_abort() -> Result<(), ()>
    }
}
