/// A state machine whose transition function is total: every (state, input)
/// pair maps to a next state, so out-of-order input can never wedge a session.
pub trait FiniteStateMachine {
    type Input;
    type Context;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self;
}
