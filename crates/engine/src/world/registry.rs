use std::rc::Rc;

use crate::config::MoveMode;

use super::entity::{Character, Overlay, Shared};
use super::grid::TileGrid;

/// Live characters and overlays of one area.
///
/// Updates run in two passes: every entity is stepped first, then dead ones
/// are dropped from the set and lose their area back-reference.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    characters: Vec<Shared<Character>>,
    overlays: Vec<Shared<Overlay>>,
}

impl EntityRegistry {
    /// Adds `character` unless it is already registered. Returns whether it
    /// was added.
    pub fn insert_character(&mut self, character: Shared<Character>) -> bool {
        if self.contains_character(&character) {
            return false;
        }
        self.characters.push(character);
        true
    }

    /// Adds `overlay` unless it is already registered. Returns whether it was
    /// added.
    pub fn insert_overlay(&mut self, overlay: Shared<Overlay>) -> bool {
        if self.contains_overlay(&overlay) {
            return false;
        }
        self.overlays.push(overlay);
        true
    }

    pub fn characters(&self) -> &[Shared<Character>] {
        &self.characters
    }

    pub fn overlays(&self) -> &[Shared<Overlay>] {
        &self.overlays
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn len(&self) -> usize {
        self.characters.len() + self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.overlays.is_empty()
    }

    pub fn contains_character(&self, character: &Shared<Character>) -> bool {
        self.characters.iter().any(|c| Rc::ptr_eq(c, character))
    }

    pub fn contains_overlay(&self, overlay: &Shared<Overlay>) -> bool {
        self.overlays.iter().any(|o| Rc::ptr_eq(o, overlay))
    }

    pub fn tick_overlays(&mut self, dt_ms: u64) {
        for overlay in &self.overlays {
            overlay.borrow_mut().tick(dt_ms);
        }
    }

    pub fn tick_characters(&mut self, dt_ms: u64, mode: MoveMode, grid: &TileGrid) {
        for character in &self.characters {
            character.borrow_mut().tick(dt_ms, mode, grid);
        }
    }

    pub fn turn_characters(&mut self, grid: &TileGrid) {
        for character in &self.characters {
            character.borrow_mut().turn(grid);
        }
    }

    /// Drops dead characters. Returns how many were removed.
    pub fn prune_characters(&mut self) -> usize {
        let before = self.characters.len();
        self.characters.retain(|character| {
            let mut character = character.borrow_mut();
            let dead = character.is_dead();
            if dead {
                character.core_mut().set_area(None);
            }
            !dead
        });
        before - self.characters.len()
    }

    /// Drops dead overlays. Returns how many were removed.
    pub fn prune_overlays(&mut self) -> usize {
        let before = self.overlays.len();
        self.overlays.retain(|overlay| {
            let mut overlay = overlay.borrow_mut();
            let dead = overlay.is_dead();
            if dead {
                overlay.core_mut().set_area(None);
            }
            !dead
        });
        before - self.overlays.len()
    }

    /// Detaches every entity. Used when the owning area is dropped.
    pub fn clear(&mut self) {
        for character in self.characters.drain(..) {
            character.borrow_mut().core_mut().set_area(None);
        }
        for overlay in self.overlays.drain(..) {
            overlay.borrow_mut().core_mut().set_area(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::world::entity::test_support::{catalog, grid};
    use crate::world::entity::{AreaId, CharacterKind};
    use crate::world::{ICoord, IVec2, RCoord};

    fn villager(area: AreaId) -> Shared<Character> {
        let mut npc = Character::from_catalog(CharacterKind::Npc, &catalog(), "villager", "down")
            .expect("npc");
        npc.core_mut().set_area(Some(area));
        Rc::new(RefCell::new(npc))
    }

    fn sparkle(area: AreaId) -> Shared<Overlay> {
        let mut overlay = Overlay::from_catalog(&catalog(), "sparkle", "burst").expect("overlay");
        overlay.core_mut().set_area(Some(area));
        Rc::new(RefCell::new(overlay))
    }

    #[test]
    fn insert_tracks_both_sets() {
        let area = AreaId::allocate();
        let mut registry = EntityRegistry::default();
        let npc = villager(area);
        let fx = sparkle(area);
        registry.insert_character(Rc::clone(&npc));
        registry.insert_overlay(Rc::clone(&fx));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains_character(&npc));
        assert!(registry.contains_overlay(&fx));
    }

    #[test]
    fn reinserting_an_entity_is_a_no_op() {
        let area = AreaId::allocate();
        let grid = grid(4, 4, false);
        let mut registry = EntityRegistry::default();
        let npc = villager(area);
        let fx = sparkle(area);
        npc.borrow_mut()
            .place(ICoord::new(0, 0, 0), RCoord::new(0.0, 0.0, 0.0));
        npc.borrow_mut().start_movement(IVec2::new(1, 0));

        assert!(registry.insert_character(Rc::clone(&npc)));
        assert!(!registry.insert_character(Rc::clone(&npc)));
        assert!(registry.insert_overlay(Rc::clone(&fx)));
        assert!(!registry.insert_overlay(Rc::clone(&fx)));
        assert_eq!(registry.character_count(), 1);
        assert_eq!(registry.overlay_count(), 1);

        registry.turn_characters(&grid);
        assert_eq!(npc.borrow().tile(), ICoord::new(1, 0, 0));
    }

    #[test]
    fn prune_removes_dead_and_clears_area() {
        let area = AreaId::allocate();
        let mut registry = EntityRegistry::default();
        let alive = villager(area);
        let doomed = villager(area);
        registry.insert_character(Rc::clone(&alive));
        registry.insert_character(Rc::clone(&doomed));
        doomed.borrow_mut().core_mut().destroy();

        assert_eq!(registry.prune_characters(), 1);
        assert_eq!(registry.character_count(), 1);
        assert!(registry.contains_character(&alive));
        assert_eq!(doomed.borrow().core().area(), None);
        assert_eq!(alive.borrow().core().area(), Some(area));
    }

    #[test]
    fn overlay_that_expires_during_tick_is_pruned_afterwards() {
        let area = AreaId::allocate();
        let mut registry = EntityRegistry::default();
        let fx = sparkle(area);
        fx.borrow_mut().set_lifetime(Some(10));
        registry.insert_overlay(Rc::clone(&fx));

        registry.tick_overlays(16);
        assert_eq!(registry.overlay_count(), 1);
        assert!(fx.borrow().is_dead());
        assert_eq!(registry.prune_overlays(), 1);
        assert_eq!(fx.borrow().core().area(), None);
    }

    #[test]
    fn turn_characters_steps_every_character() {
        let area = AreaId::allocate();
        let grid = grid(4, 4, false);
        let mut registry = EntityRegistry::default();
        let npc = villager(area);
        npc.borrow_mut()
            .place(ICoord::new(0, 0, 0), RCoord::new(0.0, 0.0, 0.0));
        npc.borrow_mut().start_movement(IVec2::new(1, 0));
        registry.insert_character(Rc::clone(&npc));
        registry.turn_characters(&grid);
        assert_eq!(npc.borrow().tile(), ICoord::new(1, 0, 0));
    }

    #[test]
    fn clear_detaches_everything() {
        let area = AreaId::allocate();
        let mut registry = EntityRegistry::default();
        let npc = villager(area);
        registry.insert_character(Rc::clone(&npc));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(npc.borrow().core().area(), None);
    }
}
