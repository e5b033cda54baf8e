use crate::entity::Entity;
use crate::error::{Result, SimulationError};
use crate::math::TV;

/// The number of built-in scene presets.
pub const NUM_PRESETS: usize = 12;

/// An ordered list of snow entities. Built once and never mutated afterwards.
#[derive(Debug)]
pub struct Scene {
    entities: Vec<Entity>,
    description: &'static str,
}

impl Scene {
    pub fn new(entities: Vec<Entity>) -> Self {
        Scene {
            entities,
            description: "Custom scene",
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Builds one of the built-in scenes, indexed `0..NUM_PRESETS`.
    pub fn preset(index: usize) -> Result<Scene> {
        let v = TV::new;
        let ball = |center: TV, radius, velocity: TV| Entity::sphere(center, radius, velocity);
        let cube = |center: TV, edge, velocity: TV| Entity::cube_uniform(center, edge, velocity);
        let block = |center: TV, edges: TV, velocity: TV| Entity::cube(center, edges, velocity);

        let (description, entities) = match index {
            0 => (
                "Snowball crash",
                vec![
                    ball(v(1.05, 0.53, 0.5), 0.04, v(-50., 0., 0.)),
                    ball(v(0.95, 0.47, 0.5), 0.04, v(50., 0., 0.)),
                ],
            ),
            1 => (
                "Snowball fall",
                vec![ball(v(1., 0.5, 0.5), 0.1, v(0., -10., 0.))],
            ),
            2 => (
                "Snowball heap",
                vec![
                    ball(v(1., 0.475, 0.5), 0.05, TV::zeros()),
                    ball(v(1., 0.55, 0.5), 0.04, TV::zeros()),
                    ball(v(1.15, 0.55, 0.5), 0.03, v(-90., 0., 0.)),
                ],
            ),
            3 => (
                "Static snowball smash",
                vec![
                    ball(v(1.1, 0.5, 0.5), 0.03, v(-75., 0., 0.)),
                    ball(v(0.93, 0.5, 0.5), 0.07, TV::zeros()),
                ],
            ),
            4 => (
                "Snowball smash",
                vec![
                    ball(v(1.1, 0.5, 0.5), 0.04, v(-45., 0., 0.)),
                    ball(v(0.9, 0.5, 0.5), 0.04, v(45., 0., 0.)),
                ],
            ),
            5 => (
                "Small snowcube and snowball",
                vec![
                    ball(v(1.1, 0.5, 0.5), 0.03, v(-75., 0., 0.)),
                    cube(v(0.9, 0.5, 0.5), 0.07, TV::zeros()),
                ],
            ),
            6 => (
                "Large snowcube and snowball",
                vec![
                    ball(v(1.1, 0.5, 0.5), 0.03, v(-75., 0., 0.)),
                    cube(v(0.9, 0.5, 0.5), 0.10, TV::zeros()),
                ],
            ),
            7 => (
                "Snowwall and snowball",
                vec![
                    ball(v(1.1, 0.5, 0.5), 0.03, v(-75., 0., 0.)),
                    block(v(0.9, 0.5, 0.5), v(0.03, 0.2, 0.05), TV::zeros()),
                ],
            ),
            8 => (
                "Snowcube smash",
                vec![
                    cube(v(1.1, 0.5, 0.5), 0.05, v(-40., 0., 0.)),
                    cube(v(0.9, 0.5, 0.5), 0.05, v(40., 0., 0.)),
                ],
            ),
            9 => (
                "Snowcube crash",
                vec![
                    block(v(1.1, 0.58, 0.5), v(0.03, 0.2, 0.05), v(-40., 0., 0.)),
                    block(v(0.9, 0.42, 0.5), v(0.03, 0.2, 0.05), v(40., 0., 0.)),
                ],
            ),
            10 => (
                "Horizontal snowcube and snowball",
                vec![
                    ball(v(1.1, 0.5, 0.5), 0.03, v(-75., 0., 0.)),
                    block(v(0.85, 0.5, 0.5), v(0.2, 0.04, 0.04), TV::zeros()),
                ],
            ),
            11 => (
                "Snowstud",
                vec![
                    block(v(1.15, 0.5, 0.5), v(0.2, 0.04, 0.04), v(-75., 0., 0.)),
                    cube(v(0.8, 0.5, 0.5), 0.15, TV::zeros()),
                ],
            ),
            _ => return Err(SimulationError::UnknownPreset(index)),
        };

        Ok(Scene {
            entities,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Shape;

    #[test]
    fn test_all_presets_build() {
        for index in 0..NUM_PRESETS {
            let scene = Scene::preset(index).unwrap();
            assert!(!scene.entities().is_empty(), "preset {} is empty", index);
            assert!(scene.entities().iter().all(|e| e.volume() > 0.));
        }

        assert!(matches!(
            Scene::preset(NUM_PRESETS),
            Err(SimulationError::UnknownPreset(12))
        ));
    }

    #[test]
    fn test_snowball_fall() {
        let scene = Scene::preset(1).unwrap();
        assert_eq!(scene.description(), "Snowball fall");
        assert_eq!(scene.entities().len(), 1);

        let entity = &scene.entities()[0];
        assert_eq!(
            entity.shape,
            Shape::Sphere {
                center: TV::new(1., 0.5, 0.5),
                radius: 0.1
            }
        );
        assert_eq!(entity.velocity, TV::new(0., -10., 0.));
    }

    #[test]
    fn test_presets_fit_in_default_domain() {
        for index in 0..NUM_PRESETS {
            for entity in Scene::preset(index).unwrap().entities() {
                let bounds = entity.bounds();
                assert!(bounds.start.iter().all(|&x| x > 0.1));
                assert!(bounds.end.x < 1.9 && bounds.end.y < 0.9 && bounds.end.z < 0.9);
            }
        }
    }
}
