use super::{LoadIndex, Loaded};
use crate::Error;
use rand::{Rng, SeedableRng, rngs::StdRng};

#[derive(Debug, Default, Clone)]
struct Slot {
    load: usize,
    position: Option<usize>,
}

impl Slot {
    fn with_load(load: usize) -> Self {
        Self {
            load,
            position: None,
        }
    }
}

impl Loaded for Slot {
    fn load(&self) -> usize {
        self.load
    }

    fn set_load(&mut self, load: usize) {
        self.load = load;
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn set_position(&mut self, position: Option<usize>) {
        self.position = position;
    }
}

fn index_of(loads: &[usize]) -> LoadIndex<Slot> {
    let mut index = LoadIndex::with_capacity(loads.len());
    for &load in loads {
        index.insert(Slot::with_load(load));
    }
    assert!(index.is_heap());
    index
}

fn loads(index: &LoadIndex<Slot>) -> Vec<usize> {
    index.iter().map(Loaded::load).collect()
}

fn min_load(index: &LoadIndex<Slot>) -> usize {
    index.iter().map(Loaded::load).min().unwrap()
}

/// The dispatch step the balancer performs: pick a least-loaded member and
/// charge it one unit.
fn dispatch(index: &mut LoadIndex<Slot>) -> usize {
    let floor = min_load(index);
    let id = index.peek_min().unwrap();
    assert_eq!(index.get(id).unwrap().load(), floor);
    index.update_and_reseat(id, 1).unwrap();
    id
}

#[test]
fn insert_assigns_sequential_ids() {
    let mut index = LoadIndex::new();
    assert!(index.is_empty());
    assert_eq!(index.insert(Slot::default()), 0);
    assert_eq!(index.insert(Slot::default()), 1);
    assert_eq!(index.insert(Slot::default()), 2);
    assert_eq!(index.len(), 3);
    assert_eq!(index.seated(), 3);
    assert!(index.is_heap());
}

#[test]
fn insert_orders_by_load() {
    let index = index_of(&[5, 3, 8, 1, 9, 2]);
    assert_eq!(index.peek_min(), Some(3));
    assert_eq!(index.total_load(), 28);
}

#[test]
fn pop_min_drains_in_load_order() {
    let mut index = index_of(&[4, 0, 7, 2, 2, 9, 1]);
    let mut drained = Vec::new();
    while let Some(id) = index.try_pop_min() {
        assert!(index.is_heap());
        assert_eq!(index.get(id).unwrap().position(), None);
        drained.push(index.get(id).unwrap().load());
    }
    assert_eq!(drained, vec![0, 1, 2, 2, 4, 7, 9]);
    assert_eq!(index.seated(), 0);
    assert_eq!(index.len(), 7);
}

#[test]
#[should_panic(expected = "empty load index")]
fn pop_min_on_empty_index_panics() {
    let mut index = LoadIndex::<Slot>::new();
    index.pop_min();
}

#[test]
fn push_reseats_popped_member() {
    let mut index = index_of(&[3, 1, 2]);
    let id = index.pop_min();
    assert_eq!(id, 1);
    assert_eq!(index.seated(), 2);

    index.push(id).unwrap();
    assert_eq!(index.seated(), 3);
    assert_eq!(index.peek_min(), Some(1));
    assert!(index.is_heap());

    // Already seated: no duplicate entry.
    index.push(id).unwrap();
    assert_eq!(index.seated(), 3);
    assert!(index.is_heap());
}

#[test]
fn push_unknown_member_fails() {
    let mut index = index_of(&[0]);
    assert_eq!(index.push(4), Err(Error::UnknownWorker { worker: 4 }));
}

#[test]
fn remove_arbitrary_member() {
    let mut index = index_of(&[6, 2, 9, 4, 1, 7, 3, 8]);
    index.remove(3).unwrap();
    assert!(index.is_heap());
    assert_eq!(index.seated(), 7);
    assert!(index.heap_order().all(|id| id != 3));

    assert_eq!(index.remove(3), Err(Error::UnknownWorker { worker: 3 }));
    assert_eq!(
        index.update_and_reseat(3, 1),
        Err(Error::UnknownWorker { worker: 3 })
    );
}

#[test]
fn increment_sifts_down() {
    let mut index = index_of(&[0, 1, 1, 2]);
    assert_eq!(index.peek_min(), Some(0));
    assert_eq!(index.update_and_reseat(0, 3), Ok(3));
    assert!(index.is_heap());
    assert_ne!(index.peek_min(), Some(0));
    assert_eq!(index.get(index.peek_min().unwrap()).unwrap().load(), 1);
}

#[test]
fn decrement_sifts_up() {
    let mut index = index_of(&[2, 3, 4, 5, 6]);
    assert_eq!(index.update_and_reseat(4, -5), Ok(1));
    assert!(index.is_heap());
    assert_eq!(index.peek_min(), Some(4));
    assert_eq!(index.get(4).unwrap().position(), Some(0));
}

#[test]
fn zero_delta_is_a_no_op() {
    let mut index = index_of(&[1, 2, 3]);
    let before: Vec<_> = index.heap_order().collect();
    assert_eq!(index.update_and_reseat(1, 0), Ok(2));
    assert_eq!(index.heap_order().collect::<Vec<_>>(), before);
}

#[test]
fn underflow_is_rejected_and_leaves_index_intact() {
    let mut index = index_of(&[0, 1]);
    let before: Vec<_> = index.heap_order().collect();

    assert_eq!(
        index.update_and_reseat(0, -1),
        Err(Error::LoadUnderflow { worker: 0 })
    );
    assert_eq!(loads(&index), vec![0, 1]);
    assert_eq!(index.heap_order().collect::<Vec<_>>(), before);
    assert!(index.is_heap());
}

#[test]
fn unknown_member_update_fails() {
    let mut index = index_of(&[0, 0]);
    assert_eq!(
        index.update_and_reseat(2, 1),
        Err(Error::UnknownWorker { worker: 2 })
    );
}

#[test]
fn three_idle_members_each_take_one() {
    let mut index = index_of(&[0, 0, 0]);
    let mut chosen: Vec<_> = (0..3).map(|_| dispatch(&mut index)).collect();
    chosen.sort_unstable();
    assert_eq!(chosen, vec![0, 1, 2]);
    assert_eq!(loads(&index), vec![1, 1, 1]);
}

#[test]
fn idle_member_is_preferred() {
    let mut index = index_of(&[2, 0]);
    assert_eq!(dispatch(&mut index), 1);
    assert_eq!(loads(&index), vec![2, 1]);
}

#[test]
fn sequential_dispatch_stays_balanced() {
    let mut index = index_of(&[0, 0]);
    for _ in 0..5 {
        dispatch(&mut index);
    }
    let mut spread = loads(&index);
    spread.sort_unstable();
    assert_eq!(spread, vec![2, 3]);
}

#[test]
fn completion_restores_order() {
    let mut index = index_of(&[1, 1, 2, 3]);
    assert_eq!(index.update_and_reseat(3, -1), Ok(2));
    assert_eq!(index.update_and_reseat(0, -1), Ok(0));
    assert!(index.is_heap());
    assert_eq!(index.peek_min(), Some(0));
}

#[test]
fn randomized_dispatch_and_completion_keep_invariants() {
    const MEMBERS: usize = 37;
    const STEPS: usize = 20_000;

    let mut rng = StdRng::seed_from_u64(0x6a09_e667_f3bc_c908);
    let mut index = index_of(&[0; MEMBERS]);
    let mut dispatched = 0_usize;
    let mut completed = 0_usize;

    for _ in 0..STEPS {
        let busy: Vec<_> = index
            .iter()
            .enumerate()
            .filter(|(_, member)| member.load() > 0)
            .map(|(id, _)| id)
            .collect();

        if busy.is_empty() || rng.random_bool(0.55) {
            dispatch(&mut index);
            dispatched += 1;
        } else {
            let id = busy[rng.random_range(0..busy.len())];
            index.update_and_reseat(id, -1).unwrap();
            completed += 1;
        }

        assert!(index.is_heap());
        assert_eq!(index.total_load(), dispatched - completed);
    }

    // Drain everything that is still outstanding.
    loop {
        let Some(id) = index.iter().position(|member| member.load() > 0) else {
            break;
        };
        index.update_and_reseat(id, -1).unwrap();
        completed += 1;
        assert!(index.is_heap());
    }
    assert_eq!(dispatched, completed);
    assert_eq!(index.total_load(), 0);
}
