//! Sans-I/O connection state machine.
//!
//! The caller owns the transport. It hands inbound chunks to
//! [`ConnectionStateMachine::feed`] and writes whatever accumulates in
//! [`ConnectionStateMachine::write_buffer`].

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::handler::{EventSink, TracingSink};
use crate::protocol::backend::{BackendMessage, MessageKind};
use crate::protocol::frontend::write_terminate;

use super::session::{Phase, Session};
use super::startup::StartupWork;
use super::work::{Handled, WorkItem, WorkQueue};

/// Reassembles frames, keeps session state and routes operation messages to
/// the active work item.
pub struct ConnectionStateMachine {
    session: Session,
    buffers: BufferSet,
    queue: WorkQueue,
    sink: Box<dyn EventSink>,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new(Box::new(TracingSink))
    }
}

impl ConnectionStateMachine {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            session: Session::new(),
            buffers: BufferSet::new(),
            queue: WorkQueue::new(),
            sink,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// Begin the handshake. The startup frame lands in the write buffer.
    pub fn connect(&mut self, startup: StartupWork) -> Result<()> {
        if self.session.phase != Phase::Disconnected {
            let message = format!("connect called in phase {:?}", self.session.phase);
            Box::new(startup).fail(Error::InvalidUsage(message.clone()));
            return Err(Error::InvalidUsage(message));
        }
        self.session.phase = Phase::Handshake;
        self.queue
            .push(Box::new(startup), &mut self.buffers.write_buffer);
        Ok(())
    }

    /// Queue an operation. It starts as soon as every earlier one has
    /// seen its ReadyForQuery.
    pub fn enqueue(&mut self, item: Box<dyn WorkItem>) {
        match self.session.phase {
            Phase::Disconnected => item.fail(Error::InvalidUsage("not connected".into())),
            Phase::Closed | Phase::Broken => item.fail(Error::ConnectionBroken),
            Phase::Handshake | Phase::Ready => {
                self.queue.push(item, &mut self.buffers.write_buffer)
            }
        }
    }

    /// Process an inbound chunk of any size.
    ///
    /// Every complete frame is decoded and routed. A framing or decode error
    /// fails the connection: the active item receives the error, queued items
    /// receive [`Error::ConnectionBroken`], and so does the caller.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        if self.session.is_terminated() {
            return Err(Error::ConnectionBroken);
        }
        self.buffers.read_buffer.extend(chunk);
        loop {
            match self.next_message() {
                Ok(Some(msg)) => self.route(msg),
                Ok(None) => return Ok(()),
                Err(e) => {
                    tracing::error!("connection failed: {}", e);
                    self.fail(e);
                    return Err(Error::ConnectionBroken);
                }
            }
        }
    }

    fn next_message(&mut self) -> Result<Option<BackendMessage>> {
        let Some(frame) = self.buffers.read_buffer.next_frame()? else {
            return Ok(None);
        };
        tracing::trace!(
            "received '{}' ({} bytes)",
            frame.type_byte.escape_ascii(),
            frame.payload.len()
        );
        BackendMessage::decode(frame.type_byte, frame.payload).map(Some)
    }

    fn route(&mut self, msg: BackendMessage) {
        match msg {
            BackendMessage::ParameterStatus(param) => {
                self.sink.parameter_status(&param.name, &param.value);
                self.session.server_params.insert(param.name, param.value);
            }
            BackendMessage::BackendKeyData(key) => {
                self.session.backend_key = Some(key);
            }
            BackendMessage::NoticeResponse(notice) => {
                self.sink.notice(&notice.fields);
            }
            BackendMessage::ReadyForQuery(ready) => {
                self.session.transaction_status = ready.status;
                if self.session.phase == Phase::Handshake {
                    tracing::debug!("handshake complete");
                    self.session.phase = Phase::Ready;
                }
                if !self
                    .queue
                    .complete(ready.status, &mut self.buffers.write_buffer)
                {
                    self.sink.unexpected(MessageKind::ReadyForQuery, false);
                }
            }
            other => {
                let kind = other.kind();
                let active = self.queue.has_active();
                match self.queue.dispatch(other) {
                    Handled::Consumed => {}
                    Handled::Unexpected => self.sink.unexpected(kind, active),
                    Handled::LateError(fields) => self.sink.late_error(&fields),
                }
            }
        }
    }

    /// Fail the connection: the active item gets `error`, queued items get
    /// [`Error::ConnectionBroken`], and later operations are refused.
    pub fn fail(&mut self, error: Error) {
        if self.session.phase != Phase::Closed {
            self.session.phase = Phase::Broken;
        }
        self.queue.fail_all(error);
    }

    /// Write Terminate and refuse further operations.
    pub fn terminate(&mut self) {
        if self.session.is_terminated() {
            return;
        }
        write_terminate(&mut self.buffers.write_buffer);
        self.session.phase = Phase::Closed;
        self.queue.fail_all(Error::ConnectionBroken);
    }

    /// Encoded frames waiting to be written to the transport.
    pub fn write_buffer(&self) -> &[u8] {
        &self.buffers.write_buffer
    }

    /// Mark the write buffer as fully written.
    pub fn clear_write_buffer(&mut self) {
        self.buffers.write_buffer.clear();
    }

    /// Take the pending outbound bytes.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffers.write_buffer)
    }

    /// True when no operation is active or queued.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ErrorFields;
    use crate::protocol::frontend::Startup;
    use crate::protocol::types::TransactionStatus;
    use crate::row::Row;
    use crate::state::query::{QueryResult, QueryWork};
    use crate::value::{TypeRegistry, Value};

    type Events = Arc<Mutex<Vec<String>>>;

    struct RecordingSink(Events);

    impl EventSink for RecordingSink {
        fn notice(&mut self, fields: &ErrorFields) {
            self.0
                .lock()
                .unwrap()
                .push(format!("notice:{}", fields.message().unwrap_or("")));
        }

        fn unexpected(&mut self, kind: MessageKind, active: bool) {
            self.0
                .lock()
                .unwrap()
                .push(format!("unexpected:{}:{}", kind, active));
        }

        fn late_error(&mut self, fields: &ErrorFields) {
            self.0
                .lock()
                .unwrap()
                .push(format!("late_error:{}", fields.code().unwrap_or("")));
        }
    }

    fn frame(type_byte: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![type_byte];
        buf.extend_from_slice(&(payload.len() as i32 + 4).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn handshake_bytes() -> Vec<u8> {
        let mut bytes = frame(b'R', &0_i32.to_be_bytes());
        bytes.extend(frame(b'S', b"server_version\x0016.2\x00"));
        let mut key = 1234_i32.to_be_bytes().to_vec();
        key.extend_from_slice(&5678_i32.to_be_bytes());
        bytes.extend(frame(b'K', &key));
        bytes.extend(frame(b'Z', b"I"));
        bytes
    }

    fn int4_scalar_result(value: i32) -> Vec<u8> {
        let mut desc = 1_i16.to_be_bytes().to_vec();
        desc.extend_from_slice(b"?column?\0");
        desc.extend_from_slice(&0_i32.to_be_bytes());
        desc.extend_from_slice(&0_i16.to_be_bytes());
        desc.extend_from_slice(&23_i32.to_be_bytes());
        desc.extend_from_slice(&4_i16.to_be_bytes());
        desc.extend_from_slice(&(-1_i32).to_be_bytes());
        desc.extend_from_slice(&1_i16.to_be_bytes());

        let mut row = 1_i16.to_be_bytes().to_vec();
        row.extend_from_slice(&4_i32.to_be_bytes());
        row.extend_from_slice(&value.to_be_bytes());

        let mut bytes = frame(b'1', b"");
        bytes.extend(frame(b'2', b""));
        bytes.extend(frame(b'T', &desc));
        bytes.extend(frame(b'D', &row));
        bytes.extend(frame(b'C', b"SELECT 1\0"));
        bytes.extend(frame(b'Z', b"I"));
        bytes
    }

    type Slot<T> = Arc<Mutex<Option<Result<T>>>>;

    fn connected(events: &Events) -> ConnectionStateMachine {
        let mut sm = ConnectionStateMachine::new(Box::new(RecordingSink(Arc::clone(events))));
        let slot: Slot<()> = Slot::default();
        let done = Arc::clone(&slot);
        sm.connect(StartupWork::new(
            Startup::new("postgres", "postgres"),
            Box::new(move |r| *done.lock().unwrap() = Some(r)),
        ))
        .unwrap();
        assert_eq!(sm.phase(), Phase::Handshake);
        sm.take_outbound();
        sm.feed(&handshake_bytes()).unwrap();
        assert!(matches!(*slot.lock().unwrap(), Some(Ok(()))));
        sm
    }

    fn query(
        sm: &mut ConnectionStateMachine,
        sql: &str,
        log: Option<(&Events, &'static str)>,
    ) -> Slot<QueryResult> {
        let slot: Slot<QueryResult> = Slot::default();
        let done = Arc::clone(&slot);
        let log = log.map(|(events, name)| (Arc::clone(events), name));
        sm.enqueue(Box::new(QueryWork::new(
            sql,
            Arc::new(TypeRegistry::default()),
            Box::new(move |r| {
                if let Some((events, name)) = log {
                    events.lock().unwrap().push(format!("{}:done", name));
                }
                *done.lock().unwrap() = Some(r);
            }),
        )));
        slot
    }

    fn scalar(slot: &Slot<QueryResult>) -> Value {
        let result = slot.lock().unwrap().take().unwrap().unwrap();
        match result.rows.as_slice() {
            [Row::Scalar(v)] => v.clone(),
            other => panic!("unexpected rows {:?}", other),
        }
    }

    #[test]
    fn test_handshake_updates_session() {
        let events = Events::default();
        let sm = connected(&events);
        let session = sm.session();
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.server_param("server_version"), Some("16.2"));
        assert_eq!((session.process_id(), session.secret_key()), (1234, 5678));
        assert_eq!(session.transaction_status, TransactionStatus::Idle);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_enqueue_before_connect_fails() {
        let mut sm = ConnectionStateMachine::default();
        let slot = query(&mut sm, "SELECT 1", None);
        assert!(matches!(
            *slot.lock().unwrap(),
            Some(Err(Error::InvalidUsage(_)))
        ));
        assert!(sm.write_buffer().is_empty());
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let events = Events::default();
        let mut sm = connected(&events);
        let slot = query(&mut sm, "SELECT 1+1+100", None);
        for b in int4_scalar_result(102) {
            sm.feed(&[b]).unwrap();
        }
        assert_eq!(scalar(&slot), Value::Int4(102));
        assert!(sm.is_idle());
    }

    #[test]
    fn test_pipelined_queries_complete_in_order() {
        let events = Events::default();
        let mut sm = connected(&events);

        let a = query(&mut sm, "SELECT 1", Some((&events, "a")));
        let after_a = sm.write_buffer().len();
        assert!(after_a > 0);
        let b = query(&mut sm, "SELECT 2", Some((&events, "b")));
        assert_eq!(sm.write_buffer().len(), after_a, "b must not start before a completes");

        let mut replies = int4_scalar_result(1);
        replies.extend(int4_scalar_result(2));

        let (first, rest) = replies.split_at(replies.len() / 2);
        sm.feed(first).unwrap();
        assert_eq!(scalar(&a), Value::Int4(1));
        assert!(sm.write_buffer().len() > after_a, "b starts after a's ReadyForQuery");
        sm.feed(rest).unwrap();
        assert_eq!(scalar(&b), Value::Int4(2));

        assert_eq!(*events.lock().unwrap(), ["a:done", "b:done"]);
    }

    #[test]
    fn test_notice_and_unexpected_go_to_sink() {
        let events = Events::default();
        let mut sm = connected(&events);

        sm.feed(&frame(b'N', b"SNOTICE\0Mhello\0\0")).unwrap();
        sm.feed(&frame(b'1', b"")).unwrap();
        sm.feed(&frame(b'Z', b"I")).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            [
                "notice:hello",
                "unexpected:ParseComplete:false",
                "unexpected:ReadyForQuery:false"
            ]
        );
        assert_eq!(sm.phase(), Phase::Ready);
    }

    #[test]
    fn test_unknown_tag_fails_everything() {
        let events = Events::default();
        let mut sm = connected(&events);
        let a = query(&mut sm, "SELECT 1", None);
        let b = query(&mut sm, "SELECT 2", None);

        assert!(matches!(
            sm.feed(&frame(b'!', b"")),
            Err(Error::ConnectionBroken)
        ));
        assert!(matches!(*a.lock().unwrap(), Some(Err(Error::Protocol(_)))));
        assert!(matches!(*b.lock().unwrap(), Some(Err(Error::ConnectionBroken))));
        assert_eq!(sm.phase(), Phase::Broken);

        let c = query(&mut sm, "SELECT 3", None);
        assert!(matches!(*c.lock().unwrap(), Some(Err(Error::ConnectionBroken))));
        assert!(matches!(sm.feed(b"Z"), Err(Error::ConnectionBroken)));
    }

    #[test]
    fn test_transaction_status_tracked() {
        let events = Events::default();
        let mut sm = connected(&events);
        let _slot = query(&mut sm, "BEGIN", None);
        let mut bytes = frame(b'1', b"");
        bytes.extend(frame(b'2', b""));
        bytes.extend(frame(b'n', b""));
        bytes.extend(frame(b'C', b"BEGIN\0"));
        bytes.extend(frame(b'Z', b"T"));
        sm.feed(&bytes).unwrap();
        assert_eq!(sm.session().transaction_status, TransactionStatus::InTransaction);
    }

    #[test]
    fn test_error_after_command_complete_reaches_sink() {
        let events = Events::default();
        let mut sm = connected(&events);
        let slot = query(&mut sm, "INSERT INTO child VALUES (1)", None);

        let mut bytes = frame(b'1', b"");
        bytes.extend(frame(b'2', b""));
        bytes.extend(frame(b'n', b""));
        bytes.extend(frame(b'C', b"INSERT 0 1\0"));
        bytes.extend(frame(
            b'E',
            b"SERROR\0C23503\0Mviolates foreign key constraint\0\0",
        ));
        bytes.extend(frame(b'Z', b"I"));
        sm.feed(&bytes).unwrap();

        let result = slot.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(result.rows_affected(), Some(1));
        assert_eq!(*events.lock().unwrap(), ["late_error:23503"]);
        assert_eq!(sm.phase(), Phase::Ready);
        assert!(sm.is_idle());
    }

    #[test]
    fn test_terminate() {
        let events = Events::default();
        let mut sm = connected(&events);
        sm.terminate();
        assert_eq!(sm.take_outbound(), [b'X', 0, 0, 0, 4]);
        assert_eq!(sm.phase(), Phase::Closed);
        let slot = query(&mut sm, "SELECT 1", None);
        assert!(matches!(*slot.lock().unwrap(), Some(Err(Error::ConnectionBroken))));
    }
}
