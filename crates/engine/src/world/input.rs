use super::coords::IVec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Quit,
}

impl InputAction {
    /// Grid step for movement actions, `None` for everything else.
    pub const fn direction(self) -> Option<IVec2> {
        match self {
            InputAction::MoveUp => Some(IVec2::new(0, -1)),
            InputAction::MoveDown => Some(IVec2::new(0, 1)),
            InputAction::MoveLeft => Some(IVec2::new(-1, 0)),
            InputAction::MoveRight => Some(IVec2::new(1, 0)),
            InputAction::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_actions_map_to_unit_steps() {
        assert_eq!(InputAction::MoveLeft.direction(), Some(IVec2::new(-1, 0)));
        assert_eq!(InputAction::MoveDown.direction(), Some(IVec2::new(0, 1)));
        assert_eq!(InputAction::Quit.direction(), None);
    }
}
