use state_machines::state_machine;

state_machine! {
    name: CycleMachine,
    state: CycleState,
    initial: Ready,
    states: [Ready, Reduced, Classified, Published],
    events {
        reduce { transition: { from: Ready, to: Reduced } }
        classify { transition: { from: Reduced, to: Classified } }
        publish { transition: { from: Classified, to: Published } }
    }
}

pub fn ready() -> CycleMachine<(), Ready> {
    CycleMachine::new(())
}
