use super::*;
use super::relay::{write_record, RecordRow, Relay, RelayItem};

#[derive(clap::Subcommand)]
pub(super) enum BotCommand {
    /// Plays one puzzle with a table of bots over an in-process relay and
    /// checks that every replica ends in the same state.
    Simulate {
        #[command(flatten)]
        puzzle: PuzzleArgs,
        #[arg(long, env = "RENKETSU_PLAYERS", default_value_t = 4)]
        players: u64,
        #[arg(long, default_value_t = 120)]
        duration_secs: u64,
        #[arg(long, env = "RENKETSU_SEED")]
        seed: Option<String>,
        #[arg(long)]
        record: Option<PathBuf>,
        #[arg(long, default_value_t = 250)]
        relay_tick_ms: u64,
        #[arg(long, default_value_t = 0)]
        net_jitter_ms: u64,
        #[arg(long, default_value_t = 300)]
        think_min_ms: u64,
        #[arg(long, default_value_t = 1500)]
        think_max_ms: u64,
        #[arg(long, default_value_t = 200)]
        drag_min_ms: u64,
        #[arg(long, default_value_t = 1200)]
        drag_max_ms: u64,
        #[arg(long, default_value_t = 16)]
        tick_min_ms: u64,
        #[arg(long, default_value_t = 40)]
        tick_max_ms: u64,
        #[arg(long, default_value_t = 0.6)]
        solve_rate: f32,
        #[arg(long, default_value_t = 0.05)]
        conflict_rate: f32,
        #[arg(long, default_value_t = 0.02)]
        abandon_rate: f32,
    },
}

pub(super) async fn run(command: BotCommand) -> Result<(), BoxError> {
    match command {
        BotCommand::Simulate {
            puzzle,
            players,
            duration_secs,
            seed,
            record,
            relay_tick_ms,
            net_jitter_ms,
            think_min_ms,
            think_max_ms,
            drag_min_ms,
            drag_max_ms,
            tick_min_ms,
            tick_max_ms,
            solve_rate,
            conflict_rate,
            abandon_rate,
        } => {
            let config = BotRunConfig {
                players,
                duration_secs,
                relay_tick_ms,
                net_jitter_ms,
                think_min_ms,
                think_max_ms,
                drag_min_ms,
                drag_max_ms,
                tick_min_ms,
                tick_max_ms,
                solve_rate,
                conflict_rate,
                abandon_rate,
            };
            let seed = match seed {
                Some(raw) => parse_seed_arg(&raw)?,
                None => rand::random::<u32>(),
            };
            let report = simulate(&puzzle, config, seed, record.is_some()).await?;
            print_report(&report);
            if let Some(path) = record {
                write_record(&path, &report.rows)?;
                info!("wrote {} relay rows to {}", report.rows.len(), path.display());
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BotRunConfig {
    players: u64,
    duration_secs: u64,
    relay_tick_ms: u64,
    net_jitter_ms: u64,
    think_min_ms: u64,
    think_max_ms: u64,
    drag_min_ms: u64,
    drag_max_ms: u64,
    tick_min_ms: u64,
    tick_max_ms: u64,
    solve_rate: f32,
    conflict_rate: f32,
    abandon_rate: f32,
}

#[derive(Debug, Clone)]
struct BotReport {
    participant: ParticipantId,
    digest: u64,
    status: PuzzleStatus,
    fitted: usize,
    count: usize,
    frames_seen: u64,
    standings: Vec<(ParticipantId, String, u32, u32)>,
}

struct SimulationReport {
    seed: u32,
    bots: Vec<BotReport>,
    rows: Vec<RecordRow>,
}

async fn simulate(
    puzzle: &PuzzleArgs,
    config: BotRunConfig,
    seed: u32,
    record: bool,
) -> Result<SimulationReport, BoxError> {
    validate_bot_config(config)?;
    let cut = puzzle.cut()?;
    let rules = puzzle.rules();
    info!(
        "simulating puzzle {} ({}x{}, {} bots, seed={:#x})",
        puzzle.puzzle_id, puzzle.cols, puzzle.rows, config.players, seed
    );

    let (relay, handles) = Relay::new(Duration::from_millis(config.relay_tick_ms), record);
    let mut tasks = Vec::new();
    for index in 0..config.players {
        let local = ParticipantId(index + 1);
        let session = Session::new(
            SessionConfig {
                puzzle_id: puzzle.puzzle_id,
                local,
                seed,
                rules,
            },
            &cut,
        )?;
        let bot = Bot {
            session,
            inbound: Some(handles.inbound.clone()),
            outbound: handles.outbound.subscribe(),
            rng: StdRng::seed_from_u64(u64::from(seed) ^ (index + 1).wrapping_mul(0x9E37_79B9)),
            config,
            closed: false,
            frames_seen: 0,
        };
        tasks.push(tokio::spawn(bot.play()));
    }
    drop(handles);
    let relay_task = tokio::spawn(relay.run());

    let mut bots = Vec::with_capacity(tasks.len());
    for task in tasks {
        bots.push(task.await??);
    }
    let rows = relay_task.await?;

    if let Some(first) = bots.first() {
        for other in &bots[1..] {
            if other.digest != first.digest {
                return Err(err_msg(format!(
                    "replicas diverged: {} has {:#018x}, {} has {:#018x}",
                    first.participant, first.digest, other.participant, other.digest
                )));
            }
        }
    }
    Ok(SimulationReport { seed, bots, rows })
}

fn print_report(report: &SimulationReport) {
    let Some(first) = report.bots.first() else {
        println!("no bots ran");
        return;
    };
    println!(
        "seed {:#x}: {} replicas converged on {:#018x}",
        report.seed,
        report.bots.len(),
        first.digest
    );
    println!(
        "status {:?}, {}/{} pieces fitted, {} frames delivered",
        first.status, first.fitted, first.count, first.frames_seen
    );
    for (id, name, score, rank) in &first.standings {
        println!("  #{rank:<3} {id:<6} {name:<10} {score}");
    }
}

struct Bot {
    session: Session,
    inbound: Option<mpsc::Sender<Vec<u8>>>,
    outbound: broadcast::Receiver<RelayItem>,
    rng: StdRng,
    config: BotRunConfig,
    closed: bool,
    frames_seen: u64,
}

impl Bot {
    async fn play(mut self) -> Result<BotReport, BoxError> {
        let local = self.session.local();
        self.session.join_local(&format!("bot-{}", local.0));
        self.flush().await?;

        let end_at = Instant::now() + Duration::from_secs(self.config.duration_secs);
        while Instant::now() < end_at && !self.closed {
            if self.session.status() == PuzzleStatus::Clear {
                break;
            }
            let think =
                sample_low_biased_u64(&mut self.rng, self.config.think_min_ms, self.config.think_max_ms);
            self.wait(Duration::from_millis(think)).await?;
            self.drag_once().await?;
        }

        if self.session.pointer_up() {
            self.flush().await?;
        }
        // Let in-flight decisions land before leaving the table.
        self.wait(Duration::from_millis(self.config.relay_tick_ms * 4)).await?;
        self.inbound = None;
        while !self.closed {
            self.wait(Duration::from_secs(3600)).await?;
        }

        let progress = self.session.progress();
        let roster = self.session.roster();
        let standings = roster
            .standings()
            .into_iter()
            .map(|p| (p.id, p.name.clone(), p.score, p.rank))
            .collect();
        debug!("bot done (participant={} frames={})", local, self.frames_seen);
        Ok(BotReport {
            participant: local,
            digest: self.session.snapshot().digest(),
            status: self.session.status(),
            fitted: progress.fitted,
            count: progress.count,
            frames_seen: self.frames_seen,
            standings,
        })
    }

    async fn drag_once(&mut self) -> Result<(), BoxError> {
        let local = self.session.local();
        if self.session.status() == PuzzleStatus::Clear || !self.session.roster().contains(local) {
            return Ok(());
        }
        let Some(piece) = choose_piece(&self.session, self.config.conflict_rate, &mut self.rng) else {
            return Ok(());
        };
        if !self.session.pointer_down(piece)? {
            return Ok(());
        }
        self.flush().await?;

        let Some(root) = self.session.dragged_piece() else {
            return Ok(());
        };
        let start = self.session.graph().absolute_position(root)?;
        let destination = choose_destination(&self.session, root, self.config.solve_rate, &mut self.rng)?;
        let drag_ms =
            sample_low_biased_u64(&mut self.rng, self.config.drag_min_ms, self.config.drag_max_ms);
        let tick_ms = self
            .rng
            .random_range(self.config.tick_min_ms..=self.config.tick_max_ms);
        let steps = (drag_ms / tick_ms).max(1);
        for step in 1..=steps {
            if !self.session.is_dragging() || self.closed {
                return Ok(());
            }
            let t = step as f32 / steps as f32;
            let at = (lerp_f32(start.0, destination.0, t), lerp_f32(start.1, destination.1, t));
            self.session.pointer_move_to(at);
            self.flush().await?;
            self.wait(Duration::from_millis(tick_ms)).await?;
        }

        if self.rng.random::<f32>() < self.config.abandon_rate {
            debug!("bot walked away (participant={} piece={})", self.session.local(), root);
            return Ok(());
        }
        if self.session.pointer_up() {
            self.flush().await?;
        }
        Ok(())
    }

    /// Applies relay output until `duration` has passed or the relay closes.
    async fn wait(&mut self, duration: Duration) -> Result<(), BoxError> {
        let deadline = Instant::now() + duration;
        loop {
            tokio::select! {
                item = self.outbound.recv() => {
                    match item {
                        Ok(item) => self.apply(item)?,
                        Err(RecvError::Closed) => {
                            self.closed = true;
                            return Ok(());
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            return Err(err_msg(format!(
                                "{} fell behind the relay by {} items",
                                self.session.local(),
                                skipped
                            )));
                        }
                    }
                    self.flush().await?;
                }
                _ = sleep_until(deadline) => return Ok(()),
            }
        }
    }

    fn apply(&mut self, item: RelayItem) -> Result<(), BoxError> {
        match item {
            RelayItem::Frame { at_ms, frame, .. } => {
                self.frames_seen += 1;
                let envelope = decode_frame(&frame)?;
                self.session.ingest(&envelope, at_ms)?;
            }
            RelayItem::Tick { at_ms, .. } => {
                self.session.tick(at_ms)?;
            }
        }
        self.session.drain_notices();
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), BoxError> {
        let outbox = self.session.drain_outbox();
        let Some(inbound) = self.inbound.as_ref() else {
            return Ok(());
        };
        for envelope in outbox {
            if self.config.net_jitter_ms > 0 {
                let delay = self.rng.random_range(0..=self.config.net_jitter_ms);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let frame = encode_frame(&envelope)?;
            inbound
                .send(frame)
                .await
                .map_err(|_| err_msg("relay stopped accepting frames"))?;
        }
        Ok(())
    }
}

fn validate_bot_config(config: BotRunConfig) -> Result<(), BoxError> {
    if config.players == 0 {
        return Err(err_msg("need at least one bot"));
    }
    if config.relay_tick_ms == 0 {
        return Err(err_msg("relay-tick-ms must be positive"));
    }
    if config.think_min_ms == 0 || config.think_max_ms < config.think_min_ms {
        return Err(err_msg("invalid think-time range"));
    }
    if config.drag_min_ms == 0 || config.drag_max_ms < config.drag_min_ms {
        return Err(err_msg("invalid drag-duration range"));
    }
    if config.tick_min_ms == 0 || config.tick_max_ms < config.tick_min_ms {
        return Err(err_msg("invalid move-tick range"));
    }
    for (name, rate) in [
        ("solve-rate", config.solve_rate),
        ("conflict-rate", config.conflict_rate),
        ("abandon-rate", config.abandon_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(err_msg(format!("{name} must be between 0 and 1")));
        }
    }
    Ok(())
}

/// Picks a loose group root, preferring ones nobody else holds unless the
/// roll asks for a conflict.
fn choose_piece(session: &Session, conflict_rate: f32, rng: &mut StdRng) -> Option<usize> {
    let local = session.local();
    let mut held_by_others = Vec::new();
    let mut available = Vec::new();
    for piece in session.graph().pieces() {
        if !piece.is_root() || piece.fitted {
            continue;
        }
        if session.holds().held_by_other(piece.id, local) {
            held_by_others.push(piece.id);
        } else {
            available.push(piece.id);
        }
    }
    if !held_by_others.is_empty() && rng.random::<f32>() < conflict_rate {
        return Some(held_by_others[rng.random_range(0..held_by_others.len())]);
    }
    if available.is_empty() {
        return None;
    }
    Some(available[rng.random_range(0..available.len())])
}

/// Where to steer a dragged group: its board slot, next to a neighbor, or a
/// random spot on the table.
fn choose_destination(
    session: &Session,
    root: usize,
    solve_rate: f32,
    rng: &mut StdRng,
) -> Result<(f32, f32), BoxError> {
    let graph = session.graph();
    let tolerance = graph.permission() * 0.5;
    let jitter = |rng: &mut StdRng| {
        (
            rng.random_range(-tolerance..=tolerance),
            rng.random_range(-tolerance..=tolerance),
        )
    };
    if rng.random::<f32>() < solve_rate {
        let target = graph.target_position(root)?;
        let (dx, dy) = jitter(rng);
        if rng.random_bool(0.5) {
            return Ok((target.0 + dx, target.1 + dy));
        }
        let piece = graph.piece(root)?;
        let members = graph.group_members(root);
        let outside: Vec<usize> = piece
            .neighbor_ids
            .iter()
            .copied()
            .filter(|id| !members.contains(id))
            .collect();
        if !outside.is_empty() {
            let neighbor = outside[rng.random_range(0..outside.len())];
            let other = graph.piece(neighbor)?;
            let at = graph.absolute_position(neighbor)?;
            return Ok((
                at.0 - (other.answer_offset.0 - piece.answer_offset.0) + dx,
                at.1 - (other.answer_offset.1 - piece.answer_offset.1) + dy,
            ));
        }
        return Ok((target.0 + dx, target.1 + dy));
    }
    let (width, height) = graph.play_area();
    Ok((rng.random_range(0.0..=width), rng.random_range(0.0..=height)))
}

fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn sample_low_biased_u64(rng: &mut StdRng, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    let span = (max - min) as f32;
    let shaped = rng.random::<f32>().powf(1.9);
    min.saturating_add((span * shaped).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config(players: u64) -> BotRunConfig {
        BotRunConfig {
            players,
            duration_secs: 30,
            relay_tick_ms: 200,
            net_jitter_ms: 15,
            think_min_ms: 50,
            think_max_ms: 300,
            drag_min_ms: 100,
            drag_max_ms: 400,
            tick_min_ms: 10,
            tick_max_ms: 30,
            solve_rate: 0.8,
            conflict_rate: 0.2,
            abandon_rate: 0.05,
        }
    }

    fn small_puzzle() -> PuzzleArgs {
        PuzzleArgs {
            puzzle_id: 9,
            cols: 3,
            rows: 2,
            piece_px: 48.0,
            hold_timeout_ms: 2_000,
        }
    }

    fn lone_session(local: u64, others: &[u64]) -> Session {
        let puzzle = small_puzzle();
        let cut = puzzle.cut().unwrap();
        let mut session = Session::new(
            SessionConfig {
                puzzle_id: puzzle.puzzle_id,
                local: ParticipantId(local),
                seed: 1,
                rules: puzzle.rules(),
            },
            &cut,
        )
        .unwrap();
        for id in std::iter::once(&local).chain(others) {
            let join = Envelope {
                puzzle_id: puzzle.puzzle_id,
                event: GameEvent::Join {
                    participant_id: ParticipantId(*id),
                    name: format!("p{id}"),
                },
            };
            session.ingest(&join, 0).unwrap();
        }
        session
    }

    #[tokio::test(start_paused = true)]
    async fn bots_converge_on_small_puzzle() {
        let report = simulate(&small_puzzle(), quick_config(3), 0x5EED, true)
            .await
            .expect("simulation");
        assert_eq!(report.bots.len(), 3);
        let first = &report.bots[0];
        assert!(report.bots.iter().all(|bot| bot.digest == first.digest));
        assert!(report.bots.iter().all(|bot| bot.frames_seen == first.frames_seen));
        assert_eq!(first.standings.len(), 3);
        assert!(report.rows.iter().any(|row| row.kind == "Join"));
        let clears = report.rows.iter().filter(|row| row.kind == "Clear").count();
        assert!(clears <= 1);
        if first.status == PuzzleStatus::Clear {
            assert_eq!(first.fitted, first.count);
            assert_eq!(clears, 1);
        }
    }

    #[test]
    fn invalid_rates_are_rejected() {
        let mut config = quick_config(2);
        config.abandon_rate = 1.5;
        assert!(validate_bot_config(config).is_err());
        let mut config = quick_config(0);
        config.abandon_rate = 0.0;
        assert!(validate_bot_config(config).is_err());
        assert!(validate_bot_config(quick_config(2)).is_ok());
    }

    #[test]
    fn choose_piece_prefers_conflict_when_requested() {
        let mut session = lone_session(2, &[1]);
        let down = Envelope {
            puzzle_id: 9,
            event: GameEvent::PieceDown {
                piece_id: 4,
                participant_id: ParticipantId(1),
            },
        };
        session.ingest(&down, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(choose_piece(&session, 1.0, &mut rng), Some(4));
        for _ in 0..20 {
            assert_ne!(choose_piece(&session, 0.0, &mut rng), Some(4));
        }
    }

    #[test]
    fn solving_destination_stays_within_tolerance_of_target() {
        let session = lone_session(1, &[]);
        let tolerance = session.graph().permission() * 0.5;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let at = choose_destination(&session, 0, 1.0, &mut rng).unwrap();
            let target = session.graph().target_position(0).unwrap();
            let neighbor_spot = |neighbor: usize| {
                let graph = session.graph();
                let here = graph.piece(0).unwrap().answer_offset;
                let there = graph.piece(neighbor).unwrap();
                let pos = graph.absolute_position(neighbor).unwrap();
                (
                    pos.0 - (there.answer_offset.0 - here.0),
                    pos.1 - (there.answer_offset.1 - here.1),
                )
            };
            let near = |spot: (f32, f32)| {
                (at.0 - spot.0).abs() <= tolerance + 1e-3 && (at.1 - spot.1).abs() <= tolerance + 1e-3
            };
            let neighbors = session.graph().piece(0).unwrap().neighbor_ids.clone();
            assert!(near(target) || neighbors.into_iter().any(|n| near(neighbor_spot(n))));
        }
    }

    #[test]
    fn low_biased_sample_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let value = sample_low_biased_u64(&mut rng, 10, 50);
            assert!((10..=50).contains(&value));
        }
        assert_eq!(sample_low_biased_u64(&mut rng, 9, 9), 9);
    }
}
