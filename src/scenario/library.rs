//! Built-in scenarios
//!
//! Each scenario walks through one ownership or dispatch behavior. Steps that
//! demonstrate a misuse report the error to the terminal and continue; they
//! fail only if the misuse goes undetected.

use super::Scenario;
use crate::dispatch::instance::Receiver;
use crate::dispatch::registry::ClassDef;
use crate::memory::handle::{NodeId, SharedHandle};
use crate::memory::value::{describe_kinds, Value, ValueKind};
use crate::sandbox::engine::Sandbox;
use crate::sandbox::errors::SandboxError;

/// Every built-in scenario, in presentation order
pub fn builtin() -> Vec<Scenario> {
    vec![
        smart_pointers(),
        weak_cycle(),
        strong_cycle(),
        virtual_dispatch(),
        overloading(),
        abstract_shape(),
        composition(),
        diamond(),
        shared_diamond(),
        dynamic_cast(),
        encapsulation(),
    ]
}

/// Look up a built-in scenario by name
pub fn find(name: &str) -> Option<Scenario> {
    builtin().into_iter().find(|scenario| scenario.name == name)
}

/// Report an expected misuse; fail if the operation went through
fn expect_err<T>(
    sb: &mut Sandbox,
    operation: &str,
    result: Result<T, SandboxError>,
) -> Result<(), SandboxError> {
    match result {
        Ok(_) => Err(SandboxError::ExpectedFailure {
            operation: operation.to_string(),
        }),
        Err(err) => {
            sb.report_error(&err);
            Ok(())
        }
    }
}

/// Method body that prints a fixed line
fn say(
    text: &'static str,
) -> impl Fn(&mut Receiver<'_>, &[Value]) -> Result<Value, SandboxError> + 'static {
    move |this: &mut Receiver<'_>, _args: &[Value]| {
        this.print(text);
        Ok(Value::Unit)
    }
}

fn text_field(this: &Receiver<'_>, field: &str) -> Result<String, SandboxError> {
    Ok(this.get(field)?.as_text().unwrap_or_default().to_string())
}

fn labels(sb: &Sandbox, nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .filter_map(|&node| sb.heap().node(node))
        .map(|node| node.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ========== Ownership ==========

pub fn smart_pointers() -> Scenario {
    Scenario::new("smart-pointers", "Shared, weak and exclusive handles")
        .summary("Counts, moves, double release and expired weak handles")
        .step("let sptr = shared(10);", |sb, vars| {
            let sptr = sb.heap_mut().create_shared("sptr", Value::from(10))?;
            vars.bind("sptr", sptr);
            Ok(())
        })
        .step("let uptr = exclusive(20);", |sb, vars| {
            let uptr = sb.heap_mut().create_exclusive("uptr", Value::from(20))?;
            vars.bind("uptr", uptr);
            Ok(())
        })
        .step("print(*sptr, *uptr);", |sb, vars| {
            let shared = sb.heap().get(&vars.shared("sptr")?)?.clone();
            let unique = sb.heap().get(&vars.exclusive("uptr")?)?.clone();
            sb.print(format!("Value of shared pointer: {}", shared));
            sb.print(format!("Value of unique pointer: {}", unique));
            Ok(())
        })
        .step("let copy = sptr.duplicate();", |sb, vars| {
            let copy = sb.heap_mut().duplicate_shared(&vars.shared("sptr")?)?;
            vars.bind("copy", copy);
            let count = sb.heap().strong_count(&copy)?;
            sb.print(format!("strong count: {}", count));
            Ok(())
        })
        .step("let wptr = weak(sptr);", |sb, vars| {
            let sptr = vars.shared("sptr")?;
            let wptr = sb.heap_mut().weak_from(&sptr)?;
            vars.bind("wptr", wptr);
            let (strong, weak) = (sb.heap().strong_count(&sptr)?, sb.heap().weak_count(&sptr)?);
            sb.print(format!("strong count: {}, weak count: {}", strong, weak));
            Ok(())
        })
        .step("let owner = move(uptr);", |sb, vars| {
            let owner = sb.heap_mut().move_exclusive(vars.exclusive("uptr")?)?;
            vars.bind("owner", owner);
            Ok(())
        })
        .step("print(*uptr);  // moved from", |sb, vars| {
            let uptr = vars.exclusive("uptr")?;
            let result = sb.heap().get(&uptr).map(|_| ());
            expect_err(sb, "read uptr", result)
        })
        .step("release(sptr);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("sptr")?)
        })
        .step("release(sptr);  // again", |sb, vars| {
            let result = sb.heap_mut().release_shared(vars.shared("sptr")?);
            expect_err(sb, "release sptr twice", result)
        })
        .step("release(copy);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("copy")?)
        })
        .step("if wptr.upgrade().is_none() { ... }", |sb, vars| {
            let upgraded = sb.heap_mut().resolve_weak(&vars.weak("wptr")?)?;
            match upgraded {
                Some(_) => Err(SandboxError::ExpectedFailure {
                    operation: "upgrade wptr".to_string(),
                }),
                None => {
                    sb.print("Weak pointer expired");
                    Ok(())
                }
            }
        })
        .step("print(*wptr);", |sb, vars| {
            let wptr = vars.weak("wptr")?;
            let result = sb.heap().get(&wptr).map(|_| ());
            expect_err(sb, "read wptr", result)
        })
        .step("drop(owner);", |sb, vars| {
            sb.heap_mut().drop_exclusive(vars.exclusive("owner")?)
        })
}

fn cross_reference(name: &str, title: &str, weak_back: bool) -> Scenario {
    let link = if weak_back {
        "a.b_ptr = weak(b);"
    } else {
        "a.b_ptr = b;"
    };
    Scenario::new(name, title)
        .step("class A { ~A() }  class B { ~B() }", |sb, _| {
            sb.register(ClassDef::new("A").destructor(say("A Destructor")))?;
            sb.register(ClassDef::new("B").destructor(say("B Destructor")))
        })
        .step("let a = shared(A);", |sb, vars| {
            let a = sb.create_object("A", "A")?;
            vars.bind("a", a);
            sb.print("A Constructor");
            Ok(())
        })
        .step("let b = shared(B);", |sb, vars| {
            let b = sb.create_object("B", "B")?;
            vars.bind("b", b);
            sb.print("B Constructor");
            Ok(())
        })
        .step(link, move |sb, vars| {
            let (a, b) = (vars.shared("a")?, vars.shared("b")?);
            if weak_back {
                sb.heap_mut().store_weak(&a, "b_ptr", &b)
            } else {
                sb.heap_mut().store_shared(&a, "b_ptr", &b)
            }
        })
        .step("b.a_ptr = a;", |sb, vars| {
            let (a, b) = (vars.shared("a")?, vars.shared("b")?);
            sb.heap_mut().store_shared(&b, "a_ptr", &a)?;
            let (sa, sb_count) = (sb.heap().strong_count(&a)?, sb.heap().strong_count(&b)?);
            sb.print(format!("strong counts: A = {}, B = {}", sa, sb_count));
            Ok(())
        })
        .step("let watch = weak(a);", |sb, vars| {
            let watch = sb.heap_mut().weak_from(&vars.shared("a")?)?;
            vars.bind("watch", watch);
            Ok(())
        })
        .step("release(a);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("a")?)?;
            let count = sb.heap().strong_count(&vars.weak("watch")?)?;
            sb.print(format!("A still alive: strong count {}", count));
            Ok(())
        })
        .step("release(b);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("b")?)
        })
        .step("watch.expired();", |sb, vars| {
            let watch = vars.weak("watch")?;
            if sb.heap().is_alive(&watch)? {
                sb.print("Weak pointer still valid");
            } else {
                sb.print("Weak pointer expired");
            }
            let leaked = sb.heap().leaked_nodes();
            if leaked.is_empty() {
                sb.print("no leaked nodes");
            } else {
                let names = labels(sb, &leaked);
                sb.print(format!("leaked: {}", names));
            }
            Ok(())
        })
}

pub fn weak_cycle() -> Scenario {
    cross_reference("weak-cycle", "Breaking a cycle with a weak handle", true)
        .summary("A holds B weakly, B holds A: releasing both reclaims both")
}

pub fn strong_cycle() -> Scenario {
    cross_reference("strong-cycle", "A reference cycle that leaks", false)
        .summary("A and B hold each other strongly: neither is ever reclaimed")
}

// ========== Dispatch ==========

fn register_animals(sb: &mut Sandbox) -> Result<(), SandboxError> {
    sb.register(
        ClassDef::new("Animal")
            .field("name", "Generic")
            .virtual_method("make_sound", &[], |this, _| {
                let name = text_field(this, "name")?;
                this.print(format!("{} makes a sound", name));
                Ok(Value::Unit)
            })
            .method("introduce", &[], |this, _| {
                let name = text_field(this, "name")?;
                this.print(format!("I am {}", name));
                this.call("make_sound", &[])
            })
            .method("eat", &[], say("Eating..."))
            .destructor(say("Animal destructor called")),
    )?;
    sb.register(
        ClassDef::new("Dog")
            .extends("Animal")
            .virtual_method("make_sound", &[], |this, _| {
                let name = text_field(this, "name")?;
                this.print(format!("{} barks", name));
                Ok(Value::Unit)
            })
            .destructor(say("Dog destructor called")),
    )
}

pub fn virtual_dispatch() -> Scenario {
    Scenario::new("virtual-dispatch", "Overriding through a base view")
        .summary("A Dog seen as an Animal still barks, even from Animal's own methods")
        .step("class Animal { .. }  class Dog : Animal { .. }", |sb, _| {
            register_animals(sb)
        })
        .step("let my_dog = shared(Dog { name: \"Rex\" });", |sb, vars| {
            let dog = sb.create_object("my_dog", "Dog")?;
            sb.write_field(&dog, "Dog", "name", "Rex")?;
            vars.bind("my_dog", dog);
            Ok(())
        })
        .step("let my_animal: Shared<Animal> = my_dog.duplicate();", |sb, vars| {
            let animal = sb.heap_mut().duplicate_shared(&vars.shared("my_dog")?)?;
            vars.bind("my_animal", animal);
            Ok(())
        })
        .step("my_animal.make_sound();", |sb, vars| {
            sb.call(&vars.shared("my_animal")?, "Animal", "make_sound", &[])
                .map(|_| ())
        })
        .step("my_animal.introduce();", |sb, vars| {
            sb.call(&vars.shared("my_animal")?, "Animal", "introduce", &[])
                .map(|_| ())
        })
        .step("Animal::make_sound(my_animal);", |sb, vars| {
            sb.call_static(&vars.shared("my_animal")?, &["Dog", "Animal"], "make_sound", &[])
                .map(|_| ())
        })
        .step("my_animal.eat();", |sb, vars| {
            sb.call(&vars.shared("my_animal")?, "Animal", "eat", &[])
                .map(|_| ())
        })
        .step("release(my_dog); release(my_animal);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("my_dog")?)?;
            sb.heap_mut().release_shared(vars.shared("my_animal")?)
        })
}

pub fn overloading() -> Scenario {
    Scenario::new("overloading", "Overloads chosen at the call site")
        .summary("Overloads are picked by the static kinds of the arguments")
        .step("class Math { add(int, int); add(float, float); }", |sb, _| {
            sb.register(
                ClassDef::new("Math")
                    .method("add", &[ValueKind::Int, ValueKind::Int], |this, args| {
                        this.print("add(int, int)");
                        let sum = args
                            .iter()
                            .filter_map(Value::as_int)
                            .fold(0i32, i32::wrapping_add);
                        Ok(Value::Int(sum))
                    })
                    .method("add", &[ValueKind::Float, ValueKind::Float], |this, args| {
                        this.print("add(float, float)");
                        let sum: f32 = args.iter().filter_map(Value::as_float).sum();
                        Ok(Value::Float(sum))
                    }),
            )
        })
        .step("let math = shared(Math);", |sb, vars| {
            let math = sb.create_object("math", "Math")?;
            vars.bind("math", math);
            Ok(())
        })
        .step("let result = math.add(3, 4);", |sb, vars| {
            let result = sb.call(&vars.shared("math")?, "Math", "add", &[Value::from(3), Value::from(4)])?;
            sb.print(format!("result = {}", result));
            Ok(())
        })
        .step("let result2 = math.add(3.5, 4.5);", |sb, vars| {
            let result = sb.call(
                &vars.shared("math")?,
                "Math",
                "add",
                &[Value::from(3.5f32), Value::from(4.5f32)],
            )?;
            sb.print(format!("result2 = {}", result));
            Ok(())
        })
        .step("math.add(3, 4.5);", |sb, vars| {
            let result = sb.call(
                &vars.shared("math")?,
                "Math",
                "add",
                &[Value::from(3), Value::from(4.5f32)],
            );
            expect_err(sb, "add(int, float)", result)
        })
        .step("release(math);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("math")?)
        })
        .step("class Vet { examine(&Animal); examine(&Dog); }", |sb, _| {
            register_animals(sb)?;
            sb.register(
                ClassDef::new("Vet")
                    .method("examine", &[ValueKind::object("Animal")], |this, args| {
                        this.print("examine(&Animal)");
                        examine_patient(this, args)
                    })
                    .method("examine", &[ValueKind::object("Dog")], |this, args| {
                        this.print("examine(&Dog)");
                        examine_patient(this, args)
                    }),
            )
        })
        .step("let rex = shared(Dog { name: \"Rex\" }); let vet = shared(Vet);", |sb, vars| {
            let rex = sb.create_object("rex", "Dog")?;
            sb.write_field(&rex, "Dog", "name", "Rex")?;
            vars.bind("rex", rex);
            let vet = sb.create_object("vet", "Vet")?;
            vars.bind("vet", vet);
            Ok(())
        })
        .step("vet.examine(&rex as &Animal);", |sb, vars| {
            let patient = sb.reference(&vars.shared("rex")?, "Animal")?;
            sb.call(&vars.shared("vet")?, "Vet", "examine", &[patient])
                .map(|_| ())
        })
        .step("vet.examine(&rex);", |sb, vars| {
            let patient = sb.reference(&vars.shared("rex")?, "Dog")?;
            sb.call(&vars.shared("vet")?, "Vet", "examine", &[patient])
                .map(|_| ())
        })
        .step("release(vet); release(rex);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("vet")?)?;
            sb.heap_mut().release_shared(vars.shared("rex")?)
        })
}

/// The overload is picked by the reference's view; the sound by the patient
fn examine_patient(this: &mut Receiver<'_>, args: &[Value]) -> Result<Value, SandboxError> {
    match args.first().and_then(Value::as_object_ref) {
        Some(patient) => this.call_ref(patient, "make_sound", &[]),
        None => Err(SandboxError::NoMatchingOverload {
            member: "examine".to_string(),
            args: describe_kinds(args),
        }),
    }
}

pub fn abstract_shape() -> Scenario {
    Scenario::new("abstract-shape", "Abstract classes")
        .summary("A class with a pure method cannot be instantiated")
        .step("class Shape { draw() = 0; }  class Circle : Shape { .. }", |sb, _| {
            sb.register(ClassDef::new("Shape").pure_virtual("draw", &[]))?;
            sb.register(
                ClassDef::new("Circle")
                    .extends("Shape")
                    .virtual_method("draw", &[], say("Drawing a circle")),
            )
        })
        .step("let shape = shared(Shape);", |sb, _| {
            let result = sb.create_object("shape", "Shape");
            expect_err(sb, "instantiate Shape", result)
        })
        .step("let my_circle: Shared<Shape> = shared(Circle);", |sb, vars| {
            let circle = sb.create_object("my_circle", "Circle")?;
            vars.bind("my_circle", circle);
            Ok(())
        })
        .step("my_circle.draw();", |sb, vars| {
            sb.call(&vars.shared("my_circle")?, "Shape", "draw", &[])
                .map(|_| ())
        })
        .step("release(my_circle);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("my_circle")?)
        })
}

pub fn composition() -> Scenario {
    Scenario::new("composition", "A car owns its engine")
        .summary("Releasing the car tears the engine down first-in, depth-first")
        .step("class Engine { .. }  class Car { engine: Engine }", |sb, _| {
            sb.register(
                ClassDef::new("Engine")
                    .field("horsepower", 150)
                    .method("start", &[], say("Engine started")),
            )?;
            sb.register(ClassDef::new("Car").method("start", &[], |this, _| {
                this.call_field("engine", "Engine", "start", &[])?;
                this.print("Car started");
                Ok(Value::Unit)
            }))
        })
        .step("let my_car = shared(Car);", |sb, vars| {
            let car = sb.create_object("my_car", "Car")?;
            vars.bind("my_car", car);
            Ok(())
        })
        .step("my_car.engine = exclusive(Engine);", |sb, vars| {
            let engine = sb.create_exclusive_object("engine", "Engine")?;
            sb.heap_mut()
                .store_exclusive(&vars.shared("my_car")?, "engine", engine)
        })
        .step("my_car.start();", |sb, vars| {
            sb.call(&vars.shared("my_car")?, "Car", "start", &[])
                .map(|_| ())
        })
        .step("release(my_car);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("my_car")?)
        })
}

fn register_bat(sb: &mut Sandbox, shared: bool) -> Result<(), SandboxError> {
    sb.register(
        ClassDef::new("Animal")
            .field("energy", 0)
            .method("eat", &[], |this, _| {
                let energy = this.get("energy")?.as_int().unwrap_or(0);
                this.set("energy", Value::Int(energy + 1))?;
                this.print("Eating...");
                Ok(Value::Unit)
            })
            .destructor(say("Animal destructor called")),
    )?;
    let (mammal, bird) = if shared {
        (
            ClassDef::new("Mammal").extends_shared("Animal"),
            ClassDef::new("Bird").extends_shared("Animal"),
        )
    } else {
        (
            ClassDef::new("Mammal").extends("Animal"),
            ClassDef::new("Bird").extends("Animal"),
        )
    };
    sb.register(
        mammal
            .method("breathe", &[], say("Breathing..."))
            .destructor(say("Mammal destructor called")),
    )?;
    sb.register(
        bird.method("fly", &[], say("Flying..."))
            .destructor(say("Bird destructor called")),
    )?;
    sb.register(
        ClassDef::new("Bat")
            .extends("Mammal")
            .extends("Bird")
            .method("navigate", &[], say("Navigating..."))
            .destructor(say("Bat destructor called")),
    )
}

fn print_energies(sb: &mut Sandbox, bat: &SharedHandle<Value>) -> Result<(), SandboxError> {
    let via_mammal = sb.read_field_at(bat, &["Bat", "Mammal", "Animal"], "energy")?;
    let via_bird = sb.read_field_at(bat, &["Bat", "Bird", "Animal"], "energy")?;
    sb.print(format!("energy via Mammal: {}, via Bird: {}", via_mammal, via_bird));
    Ok(())
}

pub fn diamond() -> Scenario {
    Scenario::new("diamond", "The diamond problem")
        .summary("Two Animal sub-objects make eat() ambiguous on a Bat")
        .step("class Bat : Mammal, Bird { .. }  // both : Animal", |sb, _| {
            register_bat(sb, false)
        })
        .step("let bat = shared(Bat);", |sb, vars| {
            let bat = sb.create_object("bat", "Bat")?;
            vars.bind("bat", bat);
            Ok(())
        })
        .step("bat.navigate(); bat.breathe(); bat.fly();", |sb, vars| {
            let bat = vars.shared("bat")?;
            for method in ["navigate", "breathe", "fly"] {
                sb.call(&bat, "Bat", method, &[])?;
            }
            Ok(())
        })
        .step("bat.eat();", |sb, vars| {
            let result = sb.call(&vars.shared("bat")?, "Bat", "eat", &[]);
            expect_err(sb, "bat.eat()", result)
        })
        .step("bat.Mammal::eat();", |sb, vars| {
            let bat = vars.shared("bat")?;
            sb.call_static(&bat, &["Bat", "Mammal", "Animal"], "eat", &[])?;
            print_energies(sb, &bat)
        })
        .step("release(bat);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("bat")?)
        })
}

pub fn shared_diamond() -> Scenario {
    Scenario::new("shared-diamond", "Resolving the diamond with a shared base")
        .summary("Mammal and Bird share one Animal: both paths see the same state")
        .step("class Mammal : shared Animal; class Bird : shared Animal;", |sb, _| {
            register_bat(sb, true)
        })
        .step("let bat = shared(Bat);", |sb, vars| {
            let bat = sb.create_object("bat", "Bat")?;
            vars.bind("bat", bat);
            Ok(())
        })
        .step("bat.eat();", |sb, vars| {
            let bat = vars.shared("bat")?;
            sb.call(&bat, "Bat", "eat", &[])?;
            print_energies(sb, &bat)
        })
        .step("bat.Mammal::energy = 5;", |sb, vars| {
            let bat = vars.shared("bat")?;
            sb.write_field_at(&bat, &["Bat", "Mammal", "Animal"], "energy", 5)?;
            print_energies(sb, &bat)
        })
        .step("release(bat);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("bat")?)
        })
}

pub fn dynamic_cast() -> Scenario {
    Scenario::new("dynamic-cast", "Checked downcasts")
        .summary("A downcast succeeds only when the object really is a Derived")
        .step("class Base { virtual foo(); }  class Derived : Base { bar(); }", |sb, _| {
            sb.register(ClassDef::new("Base").virtual_method("foo", &[], say("Base::foo")))?;
            sb.register(
                ClassDef::new("Derived")
                    .extends("Base")
                    .method("bar", &[], say("Derived::bar")),
            )
        })
        .step("let base_ptr: Shared<Base> = shared(Derived);", |sb, vars| {
            let derived = sb.create_object("base_ptr", "Derived")?;
            vars.bind("base_ptr", derived);
            Ok(())
        })
        .step("if let Some(d) = dynamic_cast::<Derived>(base_ptr) { d.bar(); }", |sb, vars| {
            let base_ptr = vars.shared("base_ptr")?;
            if sb.dynamic_cast(&base_ptr, "Derived")? {
                sb.call(&base_ptr, "Derived", "bar", &[])?;
            } else {
                sb.print("base_ptr is not a Derived");
            }
            Ok(())
        })
        .step("let plain = shared(Base);", |sb, vars| {
            let plain = sb.create_object("plain", "Base")?;
            vars.bind("plain", plain);
            Ok(())
        })
        .step("dynamic_cast::<Derived>(plain);", |sb, vars| {
            let plain = vars.shared("plain")?;
            if sb.dynamic_cast(&plain, "Derived")? {
                sb.call(&plain, "Derived", "bar", &[])?;
            } else {
                sb.print("plain is not a Derived");
            }
            Ok(())
        })
        .step("release(base_ptr); release(plain);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("base_ptr")?)?;
            sb.heap_mut().release_shared(vars.shared("plain")?)
        })
}

pub fn encapsulation() -> Scenario {
    Scenario::new("encapsulation", "Public and private fields")
        .summary("Private fields are reachable only from the class's own methods")
        .step("class MyClass { pub public_var; private_var; .. }", |sb, _| {
            sb.register(
                ClassDef::new("MyClass")
                    .field("public_var", 0)
                    .private_field("private_var", 0)
                    .method("set_private", &[ValueKind::Int], |this, args| {
                        let value = args.first().cloned().unwrap_or_default();
                        this.set("private_var", value)?;
                        Ok(Value::Unit)
                    })
                    .method("get_private", &[], |this, _| this.get("private_var")),
            )
        })
        .step("let obj = shared(MyClass);", |sb, vars| {
            let obj = sb.create_object("obj", "MyClass")?;
            vars.bind("obj", obj);
            Ok(())
        })
        .step("obj.public_var = 10;", |sb, vars| {
            let obj = vars.shared("obj")?;
            sb.write_field(&obj, "MyClass", "public_var", 10)?;
            let value = sb.read_field(&obj, "MyClass", "public_var")?;
            sb.print(format!("public_var = {}", value));
            Ok(())
        })
        .step("obj.private_var = 20;", |sb, vars| {
            let result = sb.write_field(&vars.shared("obj")?, "MyClass", "private_var", 20);
            expect_err(sb, "write private_var", result)
        })
        .step("obj.set_private(20);", |sb, vars| {
            let obj = vars.shared("obj")?;
            sb.call(&obj, "MyClass", "set_private", &[Value::from(20)])?;
            let value = sb.call(&obj, "MyClass", "get_private", &[])?;
            sb.print(format!("private_var = {}", value));
            Ok(())
        })
        .step("release(obj);", |sb, vars| {
            sb.heap_mut().release_shared(vars.shared("obj")?)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_are_unique() {
        let mut names: Vec<String> = builtin().into_iter().map(|s| s.name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(find("virtual-dispatch").is_some());
        assert!(find("nope").is_none());
    }
}
