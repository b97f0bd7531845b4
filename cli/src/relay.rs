use super::*;

pub(super) const RELAY_BUFFER: usize = 4096;

/// What the relay fans out. Ticks carry the relay clock so every replica
/// runs hold expiry at the same point of the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum RelayItem {
    Frame { seq: u64, at_ms: u64, frame: Vec<u8> },
    Tick { seq: u64, at_ms: u64 },
}

#[derive(Debug, Serialize)]
pub(super) struct RecordRow {
    pub seq: u64,
    pub at_ms: u64,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<(f32, f32)>,
}

impl RecordRow {
    fn tick(seq: u64, at_ms: u64) -> Self {
        Self {
            seq,
            at_ms,
            kind: "Tick".to_string(),
            participant: None,
            piece_id: None,
            pos: None,
        }
    }

    fn from_envelope(seq: u64, at_ms: u64, envelope: &Envelope) -> Self {
        let (piece_id, pos) = match &envelope.event {
            GameEvent::PieceDown { piece_id, .. } | GameEvent::FitPiece { piece_id, .. } => {
                (Some(*piece_id), None)
            }
            GameEvent::PieceMove { piece_id, pos, .. } | GameEvent::PieceUp { piece_id, pos, .. } => {
                (Some(*piece_id), Some(*pos))
            }
            GameEvent::ConnectPiece { child_piece_id, .. } => (Some(*child_piece_id), None),
            GameEvent::Clear { .. } | GameEvent::Join { .. } => (None, None),
        };
        Self {
            seq,
            at_ms,
            kind: format!("{:?}", envelope.event.kind()),
            participant: Some(envelope.event.sender().0),
            piece_id,
            pos,
        }
    }
}

pub(super) struct RelayHandles {
    pub inbound: mpsc::Sender<Vec<u8>>,
    pub outbound: broadcast::Sender<RelayItem>,
}

/// Sequencer standing in for the host broadcast channel: frames are stamped
/// in arrival order and fanned out to every subscriber, sender included.
pub(super) struct Relay {
    inbound: mpsc::Receiver<Vec<u8>>,
    outbound: broadcast::Sender<RelayItem>,
    tick_every: Duration,
    started: Instant,
    next_seq: u64,
    record: bool,
    rows: Vec<RecordRow>,
}

impl Relay {
    pub(super) fn new(tick_every: Duration, record: bool) -> (Self, RelayHandles) {
        let (inbound_tx, inbound_rx) = mpsc::channel(RELAY_BUFFER);
        let (outbound_tx, _) = broadcast::channel(RELAY_BUFFER);
        let relay = Self {
            inbound: inbound_rx,
            outbound: outbound_tx.clone(),
            tick_every,
            started: Instant::now(),
            next_seq: 0,
            record,
            rows: Vec::new(),
        };
        (
            relay,
            RelayHandles {
                inbound: inbound_tx,
                outbound: outbound_tx,
            },
        )
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Runs until every inbound sender is dropped, then closes the fan-out.
    pub(super) async fn run(mut self) -> Vec<RecordRow> {
        let mut ticker = interval(self.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                frame = self.inbound.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    self.forward(frame);
                }
                _ = ticker.tick() => {
                    let at_ms = self.now_ms();
                    let seq = self.stamp();
                    if self.record {
                        self.rows.push(RecordRow::tick(seq, at_ms));
                    }
                    let _ = self.outbound.send(RelayItem::Tick { seq, at_ms });
                }
            }
        }
        debug!("relay closed (frames={})", self.next_seq);
        self.rows
    }

    fn forward(&mut self, frame: Vec<u8>) {
        if let Err(err) = peek_kind(&frame) {
            warn!("relay dropped frame: {}", err);
            return;
        }
        let at_ms = self.now_ms();
        let seq = self.stamp();
        if self.record {
            match decode_frame(&frame) {
                Ok(envelope) => self.rows.push(RecordRow::from_envelope(seq, at_ms, &envelope)),
                Err(err) => warn!("relay could not record frame (seq={}): {}", seq, err),
            }
        }
        let _ = self.outbound.send(RelayItem::Frame { seq, at_ms, frame });
    }

    fn stamp(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

pub(super) fn write_record(path: &PathBuf, rows: &[RecordRow]) -> Result<(), BoxError> {
    let mut file = File::create(path)?;
    for row in rows {
        writeln!(file, "{}", serde_json::to_string(row)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_frame(id: u64) -> Vec<u8> {
        encode_frame(&Envelope {
            puzzle_id: 1,
            event: GameEvent::Join {
                participant_id: ParticipantId(id),
                name: format!("p{id}"),
            },
        })
        .expect("encode join")
    }

    #[tokio::test(start_paused = true)]
    async fn relay_orders_frames_for_every_subscriber() {
        let (relay, handles) = Relay::new(Duration::from_millis(1000), true);
        let mut a = handles.outbound.subscribe();
        let mut b = handles.outbound.subscribe();
        drop(handles.outbound);
        let task = tokio::spawn(relay.run());

        handles.inbound.send(join_frame(1)).await.expect("send");
        handles.inbound.send(vec![9, 9]).await.expect("send");
        handles.inbound.send(join_frame(2)).await.expect("send");
        drop(handles.inbound);
        let rows = task.await.expect("relay task");

        let mut seen_a = Vec::new();
        while let Ok(item) = a.recv().await {
            seen_a.push(item);
        }
        let mut seen_b = Vec::new();
        while let Ok(item) = b.recv().await {
            seen_b.push(item);
        }
        assert_eq!(seen_a, seen_b);
        let frames: Vec<Vec<u8>> = seen_a
            .into_iter()
            .filter_map(|item| match item {
                RelayItem::Frame { frame, .. } => Some(frame),
                RelayItem::Tick { .. } => None,
            })
            .collect();
        assert_eq!(frames, vec![join_frame(1), join_frame(2)]);
        assert!(rows.iter().any(|row| row.kind == "Join" && row.participant == Some(2)));
        assert!(rows.iter().all(|row| row.kind != "PieceUp"));
    }

    #[test]
    fn record_rows_serialize_compactly() {
        let envelope = Envelope {
            puzzle_id: 1,
            event: GameEvent::PieceUp {
                piece_id: 4,
                participant_id: ParticipantId(3),
                pos: (1.5, 2.0),
            },
        };
        let row = RecordRow::from_envelope(7, 120, &envelope);
        let text = serde_json::to_string(&row).expect("serialize row");
        assert_eq!(
            text,
            r#"{"seq":7,"at_ms":120,"kind":"PieceUp","participant":3,"piece_id":4,"pos":[1.5,2.0]}"#
        );
        let tick = serde_json::to_string(&RecordRow::tick(8, 130)).expect("serialize tick");
        assert_eq!(tick, r#"{"seq":8,"at_ms":130,"kind":"Tick"}"#);
    }
}
