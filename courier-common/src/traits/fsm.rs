/// A state that advances in response to inputs, refusing inputs that have no
/// edge from the current state.
pub trait FiniteStateMachine: Sized {
    type Input;
    type Error;

    /// Consume the current state and produce the next one.
    ///
    /// # Errors
    /// When `input` has no edge leaving `self`.
    fn transition(self, input: Self::Input) -> Result<Self, Self::Error>;
}
