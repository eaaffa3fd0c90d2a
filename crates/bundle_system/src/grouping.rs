//! Partitioning bundles into groups by declared scene names.
//!
//! One provisional group is seeded per distinct scene name, in first-seen
//! order. Each bundle then joins the first provisional group whose seed is one
//! of its scenes or whose accumulated scene set overlaps its scenes, and the
//! group's scene set grows by the bundle's scenes. Provisional groups are
//! never merged with each other afterwards, so two clusters that only become
//! connected through a later bundle can stay split. Bundles without scenes
//! become singleton groups after all scene groups.

/// Returns groups of indices into `scene_sets`. Scene groups come first, in
/// seed order, followed by one singleton per scene-less entry. Empty
/// provisional groups are dropped.
pub fn partition_by_scenes<S: AsRef<str>>(scene_sets: &[Vec<S>]) -> Vec<Vec<usize>> {
    let mut seeds: Vec<ProvisionalGroup<'_>> = Vec::new();
    let mut scene_less = Vec::new();

    for (index, scenes) in scene_sets.iter().enumerate() {
        if scenes.is_empty() {
            scene_less.push(vec![index]);
            continue;
        }
        for scene in scenes {
            let scene = scene.as_ref();
            if !seeds.iter().any(|g| g.seed == scene) {
                seeds.push(ProvisionalGroup::new(scene));
            }
        }
    }

    for (index, scenes) in scene_sets.iter().enumerate() {
        let scenes: Vec<&str> = scenes.iter().map(|s| s.as_ref()).collect();
        for group in seeds.iter_mut() {
            if group.try_add(index, &scenes) {
                break;
            }
        }
    }

    seeds
        .into_iter()
        .map(|group| group.members)
        .filter(|members| !members.is_empty())
        .chain(scene_less)
        .collect()
}

struct ProvisionalGroup<'a> {
    seed: &'a str,
    scenes: Vec<&'a str>,
    members: Vec<usize>,
}

impl<'a> ProvisionalGroup<'a> {
    fn new(seed: &'a str) -> Self {
        Self {
            seed,
            scenes: vec![seed],
            members: Vec::new(),
        }
    }

    fn try_add(&mut self, index: usize, scenes: &[&'a str]) -> bool {
        if self.members.contains(&index) {
            return true;
        }
        let matches = scenes.contains(&self.seed) || scenes.iter().any(|s| self.scenes.contains(s));
        if !matches {
            return false;
        }
        self.members.push(index);
        for &scene in scenes {
            if !self.scenes.contains(&scene) {
                self.scenes.push(scene);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::partition_by_scenes;

    fn sets(input: &[&[&str]]) -> Vec<Vec<String>> {
        input
            .iter()
            .map(|scenes| scenes.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn sorted(mut groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        for group in groups.iter_mut() {
            group.sort_unstable();
        }
        groups.sort();
        groups
    }

    #[test]
    fn disjoint_scene_sets_give_one_group_each() {
        let input = sets(&[&["a"], &["b", "c"], &["d"], &[]]);
        let groups = partition_by_scenes(&input);
        assert_eq!(sorted(groups), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn direct_overlap_through_shared_seed_joins() {
        let input = sets(&[&["Forest_A"], &["Forest_A", "Forest_Mid"], &["Forest_Mid", "Forest_C"]]);
        let groups = partition_by_scenes(&input);
        assert_eq!(sorted(groups), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn every_index_lands_in_exactly_one_group() {
        let input = sets(&[&["x", "y"], &[], &["y"], &["z"], &["x"], &[]]);
        let mut all: Vec<usize> = partition_by_scenes(&input).into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn scene_less_bundles_come_after_scene_groups() {
        let input = sets(&[&[], &["a"], &[]]);
        assert_eq!(partition_by_scenes(&input), vec![vec![1], vec![0], vec![2]]);
    }

    #[test]
    fn earlier_groups_are_not_merged_retroactively() {
        // Seeds are s2 then s1. C takes s2, A takes s1, and B (s1 + s2) is
        // absorbed by the s2 group first, so A stays apart from B even though
        // they share s1.
        let input = sets(&[&["s2"], &["s1"], &["s1", "s2"]]);
        let groups = partition_by_scenes(&input);
        assert_eq!(groups, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn chained_overlap_joins_when_the_scene_set_grows_first() {
        // A-B share Forest_A, B-C share Forest_Mid, plus a bundle without scenes.
        let forward = sets(&[&["Forest_A", "Forest_B"], &["Forest_A", "Forest_Mid"], &["Forest_Mid", "Forest_C"], &[]]);
        let forward_groups = sorted(partition_by_scenes(&forward));
        assert!(forward_groups.contains(&vec![3]));
        assert!(forward_groups.iter().any(|g| g.contains(&0) && g.contains(&1)));
        // Forest_A's group grows to include Forest_Mid before C is placed.
        assert_eq!(forward_groups, vec![vec![0, 1, 2], vec![3]]);

        // With C declared first, B joins C's group and A follows B through
        // the grown scene set.
        let reversed = sets(&[&["Forest_Mid", "Forest_C"], &["Forest_A", "Forest_Mid"], &["Forest_A", "Forest_B"], &[]]);
        let reversed_groups = sorted(partition_by_scenes(&reversed));
        assert_eq!(reversed_groups, vec![vec![0, 1, 2], vec![3]]);
    }
}
