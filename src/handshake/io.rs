//! Handshake framing, reassembly and DTLS flights.
//!
//! TLS handshake messages arrive as a byte stream that may split or join
//! messages arbitrarily. DTLS messages arrive as fragments with a 12 byte
//! header each, possibly reordered or duplicated. Either way this module
//! turns the input into whole messages in sequence order.
//!
//! On the way out every message is framed and queued as [`Output`]. In DTLS
//! the messages of the current flight are also kept, so they can be sent
//! again when the retransmission timer fires or the peer repeats its own
//! last flight.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Instant;

use crate::config::Config;
use crate::event::Output;
use crate::message::{frame, DtlsFragment, HandshakeHeader, DTLS_HEADER_LEN, HEADER_LEN};
use crate::message::MAX_MESSAGE_LEN;
use crate::rng::SeededRng;
use crate::timer::RetransmitTimer;
use crate::types::{HandshakeType, ProtocolVersion};
use crate::Error;

/// Record header sizes, used to fit DTLS fragments into packets.
pub(crate) const TLS_RECORD_HEADER_LEN: usize = 5;
pub(crate) const DTLS_RECORD_HEADER_LEN: usize = 13;

/// How far ahead of the next expected message_seq fragments are buffered.
const REORDER_WINDOW: u16 = 16;

/// A whole incoming handshake message.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Inbound {
    pub msg_type: HandshakeType,
    /// Header and body. DTLS messages carry the unfragmented 12 byte header.
    pub framed: Vec<u8>,
    dtls: bool,
}

impl Inbound {
    pub fn new(msg_type: HandshakeType, body: &[u8], dtls_seq: Option<u16>) -> Self {
        Inbound {
            msg_type,
            framed: frame(msg_type, body, dtls_seq),
            dtls: dtls_seq.is_some(),
        }
    }

    pub fn body(&self) -> &[u8] {
        let header = if self.dtls { DTLS_HEADER_LEN } else { HEADER_LEN };
        &self.framed[header..]
    }

    /// The bytes that enter the transcript at `version`.
    pub fn hashed_form(&self, version: Option<ProtocolVersion>) -> Vec<u8> {
        hashed_form(&self.framed, self.dtls, version)
    }
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("msg_type", &self.msg_type)
            .field("len", &self.body().len())
            .finish()
    }
}

/// Transcript form of a framed message.
///
/// DTLS 1.0 and 1.2 hash the full 12 byte header as if the message had been
/// sent in one fragment. DTLS 1.3 hashes the TLS form without the sequence
/// and fragment fields.
pub(crate) fn hashed_form(framed: &[u8], dtls: bool, version: Option<ProtocolVersion>) -> Vec<u8> {
    let dtls13 = version.map(|v| v.use_tls13_plus()).unwrap_or(false);
    if dtls && dtls13 && framed.len() >= DTLS_HEADER_LEN {
        let mut out = Vec::with_capacity(framed.len() - (DTLS_HEADER_LEN - HEADER_LEN));
        out.extend_from_slice(&framed[..HEADER_LEN]);
        out.extend_from_slice(&framed[DTLS_HEADER_LEN..]);
        return out;
    }
    framed.to_vec()
}

/// A DTLS message being put together from fragments.
struct Reassembly {
    msg_type: HandshakeType,
    body: Vec<u8>,
    /// Received byte ranges, sorted and merged.
    ranges: Vec<(usize, usize)>,
}

impl Reassembly {
    fn new(msg_type: HandshakeType, length: usize) -> Self {
        Reassembly {
            msg_type,
            body: vec![0; length],
            ranges: Vec::new(),
        }
    }

    fn insert(&mut self, header: &HandshakeHeader, frag: &DtlsFragment, data: &[u8]) -> Result<(), Error> {
        if header.msg_type != self.msg_type || header.length as usize != self.body.len() {
            return Err(Error::illegal("Fragment disagrees with earlier fragments"));
        }
        let start = frag.fragment_offset as usize;
        let end = start + data.len();
        if end > self.body.len() {
            return Err(Error::decode("Fragment beyond message end"));
        }
        self.body[start..end].copy_from_slice(data);

        self.ranges.push((start, end));
        self.ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(self.ranges.len());
        for (s, e) in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.ranges = merged;
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.body.is_empty() || self.ranges.first() == Some(&(0, self.body.len()))
    }
}

/// Something the last flight sent.
#[derive(Clone)]
enum FlightItem {
    Handshake(Vec<u8>),
    ChangeCipherSpec,
}

/// Framing state of one connection.
pub(crate) struct HandshakeIo {
    dtls: bool,
    send_seq: u16,
    recv_seq: u16,
    /// Partial TLS input.
    pending: Vec<u8>,
    /// DTLS messages being reassembled, by message_seq.
    fragments: BTreeMap<u16, Reassembly>,
    outputs: VecDeque<Output>,
    flight: Vec<FlightItem>,
    /// Whether the next send continues the current flight.
    flight_open: bool,
    timer: RetransmitTimer,
    rng: SeededRng,
    /// Largest DTLS fragment body that fits a packet.
    max_fragment: Option<usize>,
}

impl fmt::Debug for HandshakeIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeIo")
            .field("dtls", &self.dtls)
            .field("send_seq", &self.send_seq)
            .field("recv_seq", &self.recv_seq)
            .field("pending", &self.pending.len())
            .field("fragments", &self.fragments.len())
            .field("outputs", &self.outputs.len())
            .field("flight", &self.flight.len())
            .finish()
    }
}

impl HandshakeIo {
    pub fn new(config: &Config) -> Self {
        let mut rng = SeededRng::new(config.rng_seed());
        let timer = RetransmitTimer::new(config.flight_start_rto(), config.flight_retries(), &mut rng);
        let max_fragment = config
            .max_packet_size()
            .filter(|_| config.is_dtls())
            .map(|p| p.saturating_sub(DTLS_RECORD_HEADER_LEN + DTLS_HEADER_LEN).max(1));
        HandshakeIo {
            dtls: config.is_dtls(),
            send_seq: 0,
            recv_seq: 0,
            pending: Vec::new(),
            fragments: BTreeMap::new(),
            outputs: VecDeque::new(),
            flight: Vec::new(),
            flight_open: false,
            timer,
            rng,
            max_fragment,
        }
    }

    pub fn is_dtls(&self) -> bool {
        self.dtls
    }

    /// Split received handshake bytes into whole messages.
    pub fn read(&mut self, data: &[u8]) -> Result<Vec<Inbound>, Error> {
        if self.dtls {
            self.read_dtls(data)
        } else {
            self.read_tls(data)
        }
    }

    fn read_tls(&mut self, data: &[u8]) -> Result<Vec<Inbound>, Error> {
        self.pending.extend_from_slice(data);
        let mut out = Vec::new();
        loop {
            if self.pending.len() < HEADER_LEN {
                break;
            }
            let (_, header) = HandshakeHeader::parse(&self.pending, false)?;
            let len = header.length as usize;
            if len > MAX_MESSAGE_LEN {
                return Err(Error::illegal(format!("Handshake message of {} bytes", len)));
            }
            if self.pending.len() < HEADER_LEN + len {
                break;
            }
            let framed: Vec<u8> = self.pending.drain(..HEADER_LEN + len).collect();
            out.push(Inbound {
                msg_type: header.msg_type,
                framed,
                dtls: false,
            });
        }
        Ok(out)
    }

    fn read_dtls(&mut self, mut data: &[u8]) -> Result<Vec<Inbound>, Error> {
        let mut retransmitted = false;
        while !data.is_empty() {
            let (rest, header) = HandshakeHeader::parse(data, true)?;
            let frag = header
                .dtls
                .ok_or_else(|| Error::internal("DTLS header without fragment fields"))?;
            let frag_len = frag.fragment_length as usize;
            if rest.len() < frag_len {
                return Err(Error::decode("Truncated DTLS fragment"));
            }
            if header.length as usize > MAX_MESSAGE_LEN {
                return Err(Error::illegal("DTLS message too long"));
            }
            let (body, rest) = rest.split_at(frag_len);
            data = rest;

            let seq = frag.message_seq;
            if seq < self.recv_seq {
                trace!("Duplicate message_seq {} (expecting {})", seq, self.recv_seq);
                retransmitted = true;
                continue;
            }
            if seq >= self.recv_seq.saturating_add(REORDER_WINDOW) {
                trace!("Dropping message_seq {} outside reorder window", seq);
                continue;
            }
            self.fragments
                .entry(seq)
                .or_insert_with(|| Reassembly::new(header.msg_type, header.length as usize))
                .insert(&header, &frag, body)?;
        }

        if retransmitted && !self.flight.is_empty() {
            debug!("Peer repeated its flight, resending ours");
            self.resend_flight();
        }

        let mut out = Vec::new();
        while let Some(r) = self.fragments.get(&self.recv_seq) {
            if !r.is_complete() {
                break;
            }
            let Some(r) = self.fragments.remove(&self.recv_seq) else {
                break;
            };
            out.push(Inbound::new(r.msg_type, &r.body, Some(self.recv_seq)));
            self.recv_seq = self.recv_seq.wrapping_add(1);
        }
        Ok(out)
    }

    /// A message handed over already split from its header.
    pub fn inbound(&mut self, msg_type: HandshakeType, body: &[u8]) -> Inbound {
        if self.dtls {
            let seq = self.recv_seq;
            self.recv_seq = self.recv_seq.wrapping_add(1);
            Inbound::new(msg_type, body, Some(seq))
        } else {
            Inbound::new(msg_type, body, None)
        }
    }

    /// Whether any TLS bytes or DTLS fragments are waiting for the rest of a message.
    pub fn has_partial_input(&self) -> bool {
        !self.pending.is_empty() || !self.fragments.is_empty()
    }

    /// The peer sent something new, so it has our last flight.
    pub fn message_received(&mut self) {
        self.flight_open = false;
        self.timer.disarm();
    }

    fn begin_flight(&mut self, now: Instant) {
        if self.flight_open {
            return;
        }
        self.flight.clear();
        self.flight_open = true;
        if self.dtls {
            self.timer.arm(now, &mut self.rng);
        }
    }

    /// Frame and queue a handshake message. Returns the framed message.
    pub fn send(&mut self, msg_type: HandshakeType, body: &[u8], now: Instant) -> Vec<u8> {
        let seq = self.dtls.then_some(self.send_seq);
        let framed = frame(msg_type, body, seq);
        if self.dtls {
            self.send_seq = self.send_seq.wrapping_add(1);
            self.begin_flight(now);
            self.flight.push(FlightItem::Handshake(framed.clone()));
        }
        self.queue_handshake(&framed);
        framed
    }

    fn queue_handshake(&mut self, framed: &[u8]) {
        let Some(max) = self.max_fragment else {
            self.outputs.push_back(Output::Handshake(framed.to_vec()));
            return;
        };
        let body = &framed[DTLS_HEADER_LEN..];
        if body.len() <= max {
            self.outputs.push_back(Output::Handshake(framed.to_vec()));
            return;
        }
        let Ok((_, header)) = HandshakeHeader::parse(framed, true) else {
            self.outputs.push_back(Output::Handshake(framed.to_vec()));
            return;
        };
        let seq = header.dtls.map(|d| d.message_seq).unwrap_or_default();
        for (i, chunk) in body.chunks(max).enumerate() {
            let h = HandshakeHeader {
                msg_type: header.msg_type,
                length: header.length,
                dtls: Some(DtlsFragment {
                    message_seq: seq,
                    fragment_offset: (i * max) as u32,
                    fragment_length: chunk.len() as u32,
                }),
            };
            let mut out = Vec::with_capacity(DTLS_HEADER_LEN + chunk.len());
            h.serialize(&mut out);
            out.extend_from_slice(chunk);
            self.outputs.push_back(Output::Handshake(out));
        }
    }

    /// Queue a ChangeCipherSpec as part of the current flight.
    pub fn send_change_cipher_spec(&mut self, now: Instant) {
        if self.dtls {
            self.begin_flight(now);
            self.flight.push(FlightItem::ChangeCipherSpec);
        }
        self.outputs.push_back(Output::ChangeCipherSpec);
    }

    /// Queue output that is not part of a flight.
    pub fn push(&mut self, output: Output) {
        self.outputs.push_back(output);
    }

    pub fn poll_output(&mut self) -> Option<Output> {
        self.outputs.pop_front()
    }

    /// This side sent its last flight. It stays around for the peer's
    /// retransmissions but no timer runs for it.
    pub fn final_flight(&mut self) {
        self.flight_open = false;
        self.timer.disarm();
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        match self.timer.poll(now, &mut self.rng) {
            Ok(true) => {
                debug!("Flight timer expired, resending {} items", self.flight.len());
                self.resend_flight();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(()) => Err(Error::Timeout),
        }
    }

    fn resend_flight(&mut self) {
        let flight = self.flight.clone();
        for item in flight {
            match item {
                FlightItem::Handshake(framed) => self.queue_handshake(&framed),
                FlightItem::ChangeCipherSpec => self.outputs.push_back(Output::ChangeCipherSpec),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::ProtocolVersion;
    use std::time::Duration;

    fn dtls_config(max_packet_size: Option<usize>) -> Config {
        let mut b = Config::builder().versions(&[ProtocolVersion::DTLS1_2]).rng_seed(1);
        if let Some(m) = max_packet_size {
            b = b.max_packet_size(m);
        }
        b.build().unwrap()
    }

    fn drain(io: &mut HandshakeIo) -> Vec<Output> {
        std::iter::from_fn(|| io.poll_output()).collect()
    }

    #[test]
    fn tls_stream_split_and_joined() {
        let mut io = HandshakeIo::new(&Config::default());
        let a = frame(HandshakeType::ServerHelloDone, &[], None);
        let b = frame(HandshakeType::Finished, &[1, 2, 3], None);
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        assert!(io.read(&stream[..2]).unwrap().is_empty());
        let got = io.read(&stream[2..6]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].msg_type, HandshakeType::ServerHelloDone);
        let got = io.read(&stream[6..]).unwrap();
        assert_eq!(got[0].body(), &[1, 2, 3]);
        assert!(!io.has_partial_input());
    }

    #[test]
    fn dtls_fragments_reassemble_in_order() {
        let now = Instant::now();
        let mut tx = HandshakeIo::new(&dtls_config(Some(13 + 12 + 4)));
        let body: Vec<u8> = (0..10).collect();
        let framed = tx.send(HandshakeType::Certificate, &body, now);
        let frags: Vec<Vec<u8>> = drain(&mut tx)
            .into_iter()
            .map(|o| match o {
                Output::Handshake(b) => b,
                _ => panic!("unexpected output"),
            })
            .collect();
        assert_eq!(frags.len(), 3);

        let mut rx = HandshakeIo::new(&dtls_config(None));
        assert!(rx.read(&frags[2]).unwrap().is_empty());
        assert!(rx.read(&frags[0]).unwrap().is_empty());
        let got = rx.read(&frags[1]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].body(), &body[..]);
        assert_eq!(got[0].framed, framed);
    }

    #[test]
    fn dtls_out_of_order_messages_wait() {
        let mut rx = HandshakeIo::new(&dtls_config(None));
        let m0 = frame(HandshakeType::ServerHello, &[1], Some(0));
        let m1 = frame(HandshakeType::ServerHelloDone, &[], Some(1));
        assert!(rx.read(&m1).unwrap().is_empty());
        let got = rx.read(&m0).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].msg_type, HandshakeType::ServerHelloDone);
    }

    #[test]
    fn duplicate_triggers_flight_resend() {
        let now = Instant::now();
        let mut io = HandshakeIo::new(&dtls_config(None));
        let m0 = frame(HandshakeType::ClientHello, &[9], Some(0));
        io.read(&m0).unwrap();
        io.message_received();
        io.send(HandshakeType::HelloVerifyRequest, &[1, 2], now);
        io.final_flight();
        drain(&mut io);

        io.read(&m0).unwrap();
        let resent = drain(&mut io);
        assert_eq!(resent.len(), 1);
    }

    #[test]
    fn timer_resends_then_times_out() {
        let now = Instant::now();
        let config = Config::builder()
            .versions(&[ProtocolVersion::DTLS1_2])
            .flight_retries(1)
            .build()
            .unwrap();
        let mut io = HandshakeIo::new(&config);
        io.send(HandshakeType::ClientHello, &[1], now);
        io.send_change_cipher_spec(now);
        drain(&mut io);

        let deadline = io.poll_timeout().unwrap();
        io.handle_timeout(deadline).unwrap();
        assert_eq!(drain(&mut io).len(), 2);

        let later = deadline + Duration::from_secs(60);
        assert_eq!(io.handle_timeout(later), Err(Error::Timeout));
    }

    #[test]
    fn dtls13_hashes_tls_header() {
        let framed = frame(HandshakeType::Finished, &[7; 4], Some(3));
        let h12 = hashed_form(&framed, true, Some(ProtocolVersion::DTLS1_2));
        let h13 = hashed_form(&framed, true, Some(ProtocolVersion::DTLS1_3));
        assert_eq!(h12, framed);
        assert_eq!(h13, frame(HandshakeType::Finished, &[7; 4], None));
    }
}
