//! Native counterparts of the dispatch model
//!
//! The registry resolves members at runtime so the sandbox can show every
//! step. Ordinary Rust code gets the same behavior from the language:
//!
//! - overriding through a base view: trait objects (`Box<dyn Speaker>`)
//! - abstract operations: trait methods without a default body
//! - call-site overloading: a trait implemented per argument type, chosen
//!   statically
//! - a shared ancestor: composition around one `Rc<RefCell<_>>` component
//!   that every "path" refers to

use std::cell::RefCell;
use std::rc::Rc;

// ========== Overriding ==========

/// Something that can speak; `speak` may be overridden
pub trait Speaker {
    fn name(&self) -> &str;

    fn speak(&self) -> String {
        format!("{} makes a sound", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Animal {
    pub name: String,
}

impl Speaker for Animal {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct Dog {
    pub name: String,
}

impl Speaker for Dog {
    fn name(&self) -> &str {
        &self.name
    }

    fn speak(&self) -> String {
        format!("{} barks", self.name)
    }
}

/// Let every speaker speak, resolving each call on the dynamic type
pub fn chorus(speakers: &[Box<dyn Speaker>]) -> Vec<String> {
    speakers.iter().map(|s| s.speak()).collect()
}

// ========== Abstract operations ==========

pub trait Shape {
    fn area(&self) -> f64;

    fn describe(&self) -> String {
        format!("shape with area {:.2}", self.area())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Circle {
    pub radius: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rectangle {
    pub width: f64,
    pub height: f64,
}

impl Shape for Rectangle {
    fn area(&self) -> f64 {
        self.width * self.height
    }
}

// ========== Overloading ==========

/// One implementation per argument type, picked at compile time
pub trait Printable {
    fn render(&self) -> String;
}

impl Printable for i32 {
    fn render(&self) -> String {
        format!("int: {}", self)
    }
}

impl Printable for f64 {
    fn render(&self) -> String {
        format!("float: {}", self)
    }
}

impl Printable for &str {
    fn render(&self) -> String {
        format!("text: {}", self)
    }
}

pub fn print_value<T: Printable>(value: T) -> String {
    value.render()
}

// ========== Composition ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    pub horsepower: u32,
    running: bool,
}

impl Engine {
    pub fn new(horsepower: u32) -> Self {
        Engine {
            horsepower,
            running: false,
        }
    }

    pub fn start(&mut self) -> String {
        self.running = true;
        format!("Engine with {} hp started", self.horsepower)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// A car has an engine rather than being one
#[derive(Debug, Clone)]
pub struct Car {
    pub model: String,
    engine: Engine,
}

impl Car {
    pub fn new(model: impl Into<String>, engine: Engine) -> Self {
        Car {
            model: model.into(),
            engine,
        }
    }

    pub fn drive(&mut self) -> Vec<String> {
        vec![self.engine.start(), format!("{} is driving", self.model)]
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

// ========== Shared ancestor ==========

/// State every part of a composite animal shares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimalCore {
    pub energy: i32,
}

#[derive(Debug, Clone)]
pub struct MammalPart {
    core: Rc<RefCell<AnimalCore>>,
}

impl MammalPart {
    pub fn feed(&self, amount: i32) {
        self.core.borrow_mut().energy += amount;
    }
}

#[derive(Debug, Clone)]
pub struct BirdPart {
    core: Rc<RefCell<AnimalCore>>,
}

impl BirdPart {
    /// Flying costs energy; fails when there is not enough
    pub fn fly(&self, cost: i32) -> bool {
        let mut core = self.core.borrow_mut();
        if core.energy < cost {
            return false;
        }
        core.energy -= cost;
        true
    }
}

/// Both parts refer to the same core, so there is exactly one ancestor
#[derive(Debug, Clone)]
pub struct Bat {
    pub mammal: MammalPart,
    pub bird: BirdPart,
    core: Rc<RefCell<AnimalCore>>,
}

impl Bat {
    pub fn new(energy: i32) -> Self {
        let core = Rc::new(RefCell::new(AnimalCore { energy }));
        Bat {
            mammal: MammalPart {
                core: Rc::clone(&core),
            },
            bird: BirdPart {
                core: Rc::clone(&core),
            },
            core,
        }
    }

    pub fn energy(&self) -> i32 {
        self.core.borrow().energy
    }

    /// Number of owners of the core (the bat and both parts)
    pub fn core_owners(&self) -> usize {
        Rc::strong_count(&self.core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_objects_dispatch_to_override() {
        let speakers: Vec<Box<dyn Speaker>> = vec![
            Box::new(Animal {
                name: "Generic".to_string(),
            }),
            Box::new(Dog {
                name: "Rex".to_string(),
            }),
        ];
        assert_eq!(chorus(&speakers), vec!["Generic makes a sound", "Rex barks"]);
    }

    #[test]
    fn test_shapes_share_default_describe() {
        let shapes: Vec<Box<dyn Shape>> = vec![
            Box::new(Circle { radius: 1.0 }),
            Box::new(Rectangle {
                width: 2.0,
                height: 3.0,
            }),
        ];
        let described: Vec<String> = shapes.iter().map(|s| s.describe()).collect();
        assert_eq!(described, vec!["shape with area 3.14", "shape with area 6.00"]);
    }

    #[test]
    fn test_overload_picked_by_argument_type() {
        assert_eq!(print_value(5), "int: 5");
        assert_eq!(print_value(5.5), "float: 5.5");
        assert_eq!(print_value("five"), "text: five");
    }

    #[test]
    fn test_car_delegates_to_engine() {
        let mut car = Car::new("Roadster", Engine::new(300));
        assert!(!car.engine().is_running());
        assert_eq!(
            car.drive(),
            vec!["Engine with 300 hp started", "Roadster is driving"]
        );
        assert!(car.engine().is_running());
    }

    #[test]
    fn test_bat_parts_share_one_core() {
        let bat = Bat::new(1);
        assert_eq!(bat.core_owners(), 3);
        bat.mammal.feed(4);
        assert!(bat.bird.fly(3));
        assert_eq!(bat.energy(), 2);
        assert!(!bat.bird.fly(5));
        assert_eq!(bat.energy(), 2);
    }
}
