//! Reference-model properties for the observable containers: arbitrary
//! operation sequences against a plain map or vector must agree, whether
//! the container is read idle (pull) or watched live (push).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ahash::AHashMap;
use proptest::prelude::*;
use weft_reactive::{Dict, List};

#[derive(Clone, Debug)]
enum DictOp {
    Put(u8, i32),
    Remove(u8),
    Clear,
    Set(Vec<(u8, i32)>),
}

fn dict_op() -> impl Strategy<Value = DictOp> {
    prop_oneof![
        4 => (0u8..6, -100i32..100).prop_map(|(k, v)| DictOp::Put(k, v)),
        2 => (0u8..6).prop_map(DictOp::Remove),
        1 => Just(DictOp::Clear),
        1 => proptest::collection::vec((0u8..6, -100i32..100), 0..5).prop_map(DictOp::Set),
    ]
}

fn apply_dict(dict: &Dict<u8, i32>, model: &mut BTreeMap<u8, i32>, op: &DictOp) {
    match op {
        DictOp::Put(k, v) => {
            dict.put(*k, *v);
            model.insert(*k, *v);
        }
        DictOp::Remove(k) => {
            dict.remove(k);
            model.remove(k);
        }
        DictOp::Clear => {
            dict.clear();
            model.clear();
        }
        DictOp::Set(entries) => {
            dict.set(entries.clone());
            model.clear();
            model.extend(entries.iter().copied());
        }
    }
}

fn as_map(model: &BTreeMap<u8, i32>) -> AHashMap<u8, i32> {
    model.iter().map(|(&k, &v)| (k, v)).collect()
}

#[derive(Clone, Debug)]
enum ListOp {
    Push(i32),
    Insert(usize, i32),
    Remove(usize),
    Clear,
    Set(Vec<i32>),
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => (-100i32..100).prop_map(ListOp::Push),
        2 => (0usize..8, -100i32..100).prop_map(|(i, v)| ListOp::Insert(i, v)),
        2 => (0usize..8).prop_map(ListOp::Remove),
        1 => Just(ListOp::Clear),
        1 => proptest::collection::vec(-100i32..100, 0..5).prop_map(ListOp::Set),
    ]
}

fn apply_list(list: &List<i32>, model: &mut Vec<i32>, op: &ListOp) {
    match op {
        ListOp::Push(v) => {
            list.push(*v);
            model.push(*v);
        }
        ListOp::Insert(i, v) => {
            // Insertion past the end clamps to an append.
            list.insert(*i, *v);
            let at = (*i).min(model.len());
            model.insert(at, *v);
        }
        ListOp::Remove(i) => {
            list.remove(*i);
            if *i < model.len() {
                model.remove(*i);
            }
        }
        ListOp::Clear => {
            list.clear();
            model.clear();
        }
        ListOp::Set(values) => {
            list.set(values.iter().copied());
            model.clone_from(values);
        }
    }
}

proptest! {
    #[test]
    fn idle_dict_reads_match_the_model(ops in proptest::collection::vec(dict_op(), 0..40)) {
        let dict: Dict<u8, i32> = Dict::new();
        let mut model = BTreeMap::new();
        for op in &ops {
            apply_dict(&dict, &mut model, op);
        }

        prop_assert_eq!(dict.get(), as_map(&model));
        prop_assert_eq!(dict.len(), model.len());
        for key in 0u8..6 {
            prop_assert_eq!(dict.value_of(&key), model.get(&key).copied());
            prop_assert_eq!(dict.contains_key(&key), model.contains_key(&key));
        }
        prop_assert_eq!(dict.listener_count(), 0);
    }

    #[test]
    fn live_dict_broadcasts_converge_on_the_model(ops in proptest::collection::vec(dict_op(), 1..40)) {
        let dict: Dict<u8, i32> = Dict::new();
        let seen: Rc<RefCell<Vec<AHashMap<u8, i32>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut sub = dict.observe(move |snapshot| sink.borrow_mut().push(snapshot.clone()));

        let mut model = BTreeMap::new();
        for op in &ops {
            apply_dict(&dict, &mut model, op);
        }

        // Immediate mode: the last broadcast snapshot is the final state.
        if let Some(last) = seen.borrow().last() {
            prop_assert_eq!(last.clone(), as_map(&model));
        }
        prop_assert_eq!(dict.get(), as_map(&model));
        sub.release();
        prop_assert!(!dict.live());
    }

    #[test]
    fn dict_transaction_coalesces_to_one_broadcast(ops in proptest::collection::vec(dict_op(), 1..40)) {
        let dict: Dict<u8, i32> = Dict::new();
        let broadcasts = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&broadcasts);
        let _sub = dict.observe(move |_| *sink.borrow_mut() += 1);

        let mut model = BTreeMap::new();
        dict.transaction(|| {
            for op in &ops {
                apply_dict(&dict, &mut model, op);
            }
        });

        prop_assert!(*broadcasts.borrow() <= 1);
        prop_assert_eq!(dict.get(), as_map(&model));
    }

    #[test]
    fn idle_list_reads_match_the_model(ops in proptest::collection::vec(list_op(), 0..40)) {
        let list: List<i32> = List::new();
        let mut model = Vec::new();
        for op in &ops {
            apply_list(&list, &mut model, op);
        }

        prop_assert_eq!(list.get(), model.clone());
        prop_assert_eq!(list.len(), model.len());
        for i in 0..model.len() + 1 {
            prop_assert_eq!(list.value_at(i), model.get(i).copied());
        }
        prop_assert_eq!(list.listener_count(), 0);
    }

    #[test]
    fn live_list_broadcasts_converge_on_the_model(ops in proptest::collection::vec(list_op(), 1..40)) {
        let list: List<i32> = List::new();
        let seen: Rc<RefCell<Vec<Vec<i32>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut sub = list.observe(move |snapshot| sink.borrow_mut().push(snapshot.clone()));

        let mut model = Vec::new();
        for op in &ops {
            apply_list(&list, &mut model, op);
        }

        if let Some(last) = seen.borrow().last() {
            prop_assert_eq!(last.clone(), model.clone());
        }
        prop_assert_eq!(list.get(), model);
        sub.release();
        prop_assert!(!list.live());
    }
}
