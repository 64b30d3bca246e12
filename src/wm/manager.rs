//! Windowed terminal - multiplexes regions onto one physical terminal
//!
//! Only one scroll region is programmed into the real terminal at a time.
//! Switching regions saves the outgoing cursor and attributes (as tracked by
//! the emulator) into the old region, reprograms the scroll region, and
//! restores the incoming region's saved state.

use std::collections::HashMap;

use super::pane::{FullscreenPane, RegionPane};
use super::region::{RegionId, ScrollRegion, FULLSCREEN};
use crate::core::TerminalIO;

pub struct WindowedTerminal {
    io: TerminalIO,
    regions: HashMap<RegionId, ScrollRegion>,
    next_region_id: RegionId,
    /// Region currently programmed into the terminal
    active: RegionId,
}

impl WindowedTerminal {
    pub fn new(io: TerminalIO) -> Self {
        let mut regions = HashMap::new();
        regions.insert(FULLSCREEN, ScrollRegion::fullscreen());
        Self {
            io,
            regions,
            next_region_id: FULLSCREEN + 1,
            active: FULLSCREEN,
        }
    }

    pub fn io(&self) -> &TerminalIO {
        &self.io
    }

    /// Direct access; callers writing through this bypass region tracking
    pub fn io_mut(&mut self) -> &mut TerminalIO {
        &mut self.io
    }

    /// (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        self.io.size()
    }

    pub fn active_region(&self) -> RegionId {
        self.active
    }

    pub fn region(&self, id: RegionId) -> Option<&ScrollRegion> {
        self.regions.get(&id)
    }

    /// Register a region over rows `row_start..=row_end`
    pub fn create_region(&mut self, row_start: u16, row_end: u16) -> RegionId {
        let id = self.next_region_id;
        self.next_region_id += 1;
        self.regions.insert(id, ScrollRegion::new(row_start, row_end));
        tracing::debug!(id, row_start, row_end, "region created");
        id
    }

    /// Move a region. If it is active, the terminal is reprogrammed.
    pub fn set_region_bounds(&mut self, id: RegionId, row_start: u16, row_end: u16) -> bool {
        if id == FULLSCREEN {
            return false;
        }
        let Some(region) = self.regions.get_mut(&id) else {
            return false;
        };
        region.set_bounds(row_start, row_end);

        if self.active == id {
            let cursor = self.io.cursor().clone();
            if let Some(region) = self.regions.get_mut(&id) {
                region.save(&cursor);
            }
            self.program(id);
        }
        true
    }

    /// Forget a region; the fullscreen sentinel cannot be removed
    pub fn remove_region(&mut self, id: RegionId) -> bool {
        if id == FULLSCREEN {
            return false;
        }
        if self.active == id {
            self.activate(FULLSCREEN);
        }
        self.regions.remove(&id).is_some()
    }

    /// Make `id` the programmed region. Returns false for an unknown id.
    pub fn activate(&mut self, id: RegionId) -> bool {
        if id == self.active {
            return true;
        }
        if !self.regions.contains_key(&id) {
            return false;
        }

        let cursor = self.io.cursor().clone();
        if let Some(outgoing) = self.regions.get_mut(&self.active) {
            outgoing.save(&cursor);
        }

        self.program(id);
        self.active = id;
        true
    }

    /// Issue the region escape, then restore the region's cursor and colors
    fn program(&mut self, id: RegionId) {
        let Some(region) = self.regions.get(&id).cloned() else {
            return;
        };
        let (rows, cols) = self.io.size();

        let (top, bottom) = region.bounds(rows);
        if region.fullscreen || top >= bottom {
            // A one-row DECSTBM is ignored by terminals; run unrestricted
            self.io.reset_scroll_region();
        } else {
            self.io.set_scroll_region(top, bottom);
        }

        let (row, col) = region.restore_position(rows, cols);
        self.io.move_to(row, col);
        self.io.set_attributes(region.saved_attrs);
    }

    /// Re-send the active region after the terminal size changed
    pub fn refresh(&mut self) {
        let cursor = self.io.cursor().clone();
        if let Some(region) = self.regions.get_mut(&self.active) {
            region.save(&cursor);
        }
        self.program(self.active);
    }

    pub fn pane(&mut self, id: RegionId) -> Option<RegionPane<'_>> {
        if self.regions.contains_key(&id) {
            Some(RegionPane::new(self, id))
        } else {
            None
        }
    }

    pub fn fullscreen_pane(&mut self) -> RegionPane<'_> {
        RegionPane::new(self, FULLSCREEN)
    }

    /// Untracked whole-terminal access, leaving windowed mode first
    pub fn passthrough(&mut self) -> FullscreenPane<'_> {
        self.activate(FULLSCREEN);
        FullscreenPane::new(&mut self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::loopback_pair;
    use crate::core::term::{Attributes, Color};
    use crate::core::terminal_io::TerminalSettings;
    use crate::core::terminal_io::fake::FakeTerminal;
    use crate::wm::pane::PaneOps;
    use std::time::Duration;

    fn windowed() -> (WindowedTerminal, std::net::TcpStream) {
        let (server, client) = loopback_pair();
        let io = TerminalIO::new(server, TerminalSettings::default()).unwrap();
        (WindowedTerminal::new(io), client)
    }

    /// Windowed terminal talking to an emulated 24x80 terminal
    fn emulated() -> (WindowedTerminal, FakeTerminal) {
        let (server, client) = loopback_pair();
        let fake = FakeTerminal::spawn(client, 24, 80);
        let settings = TerminalSettings {
            ask_timeout: Duration::from_secs(5),
            ..TerminalSettings::default()
        };
        let io = TerminalIO::new(server, settings).unwrap();
        (WindowedTerminal::new(io), fake)
    }

    /// Bytes the far end has seen so far. The cursor query round trip
    /// guarantees everything sent before it has arrived; the query itself
    /// is cut off.
    fn wire(term: &mut WindowedTerminal, fake: &FakeTerminal) -> Vec<u8> {
        term.io_mut().ask_cursor_position().unwrap();
        let mut bytes = fake.received();
        assert!(bytes.ends_with(b"\x1b[6n"));
        bytes.truncate(bytes.len() - 4);
        bytes
    }

    fn sent_during(
        term: &mut WindowedTerminal,
        fake: &FakeTerminal,
        op: impl FnOnce(&mut WindowedTerminal),
    ) -> String {
        let before = wire(term, fake).len();
        op(term);
        let after = wire(term, fake);
        String::from_utf8_lossy(&after[before + 4..]).into_owned()
    }

    fn position(term: &WindowedTerminal) -> (u16, u16) {
        let cursor = term.io().cursor();
        (cursor.row, cursor.col)
    }

    #[test]
    fn test_activation_round_trip() {
        let (mut term, _client) = windowed();
        term.io_mut().move_to(10, 20);
        term.io_mut().set_attributes(Attributes::fg(Color::Red) | Attributes::BRIGHT);

        let region = term.create_region(2, 4);
        assert!(term.activate(region));
        assert_eq!(term.io().emulator().scroll_region(), Some((2, 4)));
        assert_eq!(position(&term), (2, 1));
        assert_eq!(term.io().emulator().attributes(), Attributes::empty());

        term.io_mut().print("inside");
        term.io_mut().set_attributes(Attributes::bg(Color::Blue));

        assert!(term.activate(FULLSCREEN));
        assert_eq!(term.io().emulator().scroll_region(), None);
        assert_eq!(position(&term), (10, 20));
        assert_eq!(
            term.io().emulator().attributes(),
            Attributes::FG_RED | Attributes::BRIGHT
        );

        // Region kept its own state
        assert!(term.activate(region));
        assert_eq!(position(&term), (2, 7));
        assert_eq!(term.io().emulator().attributes(), Attributes::BG_BLUE);
    }

    #[test]
    fn test_activate_same_region_is_free() {
        let (mut term, _client) = windowed();
        let region = term.create_region(1, 5);
        term.activate(region);
        term.io_mut().move_to(3, 3);

        term.activate(region);
        assert_eq!(position(&term), (3, 3));
        assert!(!term.activate(99));
    }

    #[test]
    fn test_pane_operations_stay_in_region() {
        let (mut term, _client) = windowed();
        let top = term.create_region(1, 10);
        let bottom = term.create_region(12, 24);

        {
            let mut pane = term.pane(bottom).unwrap();
            assert_eq!(pane.height(), 13);
            assert_eq!(pane.width(), 80);
            pane.set_cursor(2, 5);
            assert_eq!(pane.cursor(), (2, 5));
            pane.set_cursor(99, 1);
            assert_eq!(pane.cursor(), (13, 1));
        }
        assert_eq!(position(&term), (24, 1));

        {
            let mut pane = term.pane(top).unwrap();
            pane.print("abc");
            assert_eq!(pane.cursor(), (1, 4));
        }

        // Switching back restores where the bottom pane left off
        let pane = term.pane(bottom).unwrap();
        assert_eq!(pane.cursor(), (13, 1));
    }

    #[test]
    fn test_clear_homes_cursor() {
        let (mut term, _client) = windowed();
        let region = term.create_region(5, 8);
        let mut pane = term.pane(region).unwrap();
        pane.set_cursor(3, 10);
        pane.clear();
        assert_eq!(pane.cursor(), (1, 1));

        pane.set_cursor(2, 4);
        pane.clear_down();
        assert_eq!(pane.cursor(), (2, 1));
    }

    #[test]
    fn test_remove_active_region_falls_back() {
        let (mut term, _client) = windowed();
        let region = term.create_region(3, 6);
        term.activate(region);

        assert!(term.remove_region(region));
        assert_eq!(term.active_region(), FULLSCREEN);
        assert!(term.pane(region).is_none());
        assert!(!term.remove_region(FULLSCREEN));
    }

    #[test]
    fn test_set_bounds_reprograms_active_region() {
        let (mut term, _client) = windowed();
        let region = term.create_region(3, 6);
        term.activate(region);

        assert!(term.set_region_bounds(region, 10, 20));
        assert_eq!(term.io().emulator().scroll_region(), Some((10, 20)));
        assert_eq!(position(&term).0, 10);
    }

    #[test]
    fn test_clear_paints_each_row_on_the_wire() {
        let (mut term, fake) = emulated();
        let region = term.create_region(5, 6);
        term.activate(region);

        let sent = sent_during(&mut term, &fake, |term| {
            term.pane(region).unwrap().clear();
        });
        assert_eq!(sent, "\x1b[5;1H \x1b[K\x1b[6;1H \x1b[K\x1b[5;1H");

        let sent = sent_during(&mut term, &fake, |term| {
            let mut pane = term.pane(region).unwrap();
            pane.set_cursor(2, 3);
            pane.clear_down();
        });
        assert_eq!(sent, "\x1b[6;3H\x1b[6;1H \x1b[K\x1b[6;1H");
    }

    #[test]
    fn test_region_is_reprogrammed_only_on_switch() {
        let (mut term, fake) = emulated();
        let left = term.create_region(2, 4);
        let right = term.create_region(6, 9);
        term.activate(left);

        let sent = sent_during(&mut term, &fake, |term| {
            assert!(term.activate(left));
            term.pane(left).unwrap().print("x");
        });
        assert_eq!(sent, "x");

        let sent = sent_during(&mut term, &fake, |term| {
            term.pane(right).unwrap().print("y");
            term.pane(right).unwrap().print("z");
        });
        assert_eq!(sent.matches('r').count(), 1);
        assert!(sent.starts_with("\x1b[6;9r"));
        assert!(sent.ends_with("yz"));
    }

    #[test]
    fn test_single_row_region_runs_unrestricted() {
        let (mut term, fake) = emulated();
        let region = term.create_region(7, 7);

        let sent = sent_during(&mut term, &fake, |term| {
            term.activate(region);
        });
        assert!(sent.starts_with("\x1b[r"));
        assert_eq!(term.active_region(), region);
        assert_eq!(term.io().emulator().scroll_region(), None);
        assert_eq!(position(&term), (7, 1));

        let mut pane = term.pane(region).unwrap();
        assert_eq!(pane.height(), 1);
        pane.set_cursor(3, 2);
        assert_eq!(pane.cursor(), (1, 2));
    }
}
