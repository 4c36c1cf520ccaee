// User-facing texts

pub const WELCOME: &str = "\
🌸 Добро пожаловать в бота для генерации хокку! 🌸

Я умею создавать красивые японские стихотворения по вашей первой строке.

📝 Как использовать:
• Напишите первую строку хокку
• Я придумаю продолжение в традиционном стиле

🎯 Команды:
/start - показать это сообщение
/help - подробная помощь
/example - примеры хокку
/stats - статистика бота
/retrain - переобучить модель (только для админа)

💡 Совет: первая строка должна содержать 5 слогов для лучшего результата!";

pub const HELP: &str = "\
📚 ПОДРОБНАЯ ПОМОЩЬ

🎋 Что такое хокку?
Хокку - традиционная форма японской поэзии из 3 строк:
• 1-я строка: 5 слогов
• 2-я строка: 7 слогов
• 3-я строка: 5 слогов

🖋️ Как пользоваться ботом:
1. Напишите первую строку (желательно 5 слогов)
2. Бот сгенерирует продолжение
3. Наслаждайтесь получившимся хокку!

✨ Примеры хороших первых строк:
• \"Утренний туман\" (5 слогов)
• \"Весенний дождик льет\" (6 слогов)
• \"Осенние листья\" (6 слогов)

🎨 Темы для вдохновения:
• Природа и времена года
• Животные и растения
• Чувства и настроения
• Городская жизнь
• Философские размышления";

pub const EXAMPLES: [(&str, &str); 5] = [
    ("Утренний туман", "Стелется над рекой\nПризрачным покровом"),
    ("Весенний дождик льет", "По листьям тихо бьет\nЗемля благоухает"),
    ("Осенние листья", "Кружатся в вихре ветра\nЗолотой ковер"),
    ("Первый снег упал", "На голые ветви\nМир стал белоснежным"),
    ("Летний зной палит", "Цикады песни поют\nВ тени прохлада"),
];

pub const RANDOM_STARTS: [&str; 12] = [
    "Утренняя роса",
    "Вечерний закат",
    "Зимний ветер",
    "Летний дождь",
    "Осенний лист",
    "Весенний цветок",
    "Горная тропа",
    "Морские волны",
    "Лесная тишь",
    "Городской шум",
    "Детский смех",
    "Старый дом",
];

pub const STILL_TRAINING: &str =
    "🤖 Модель еще обучается, пожалуйста подождите...\n⏱️ Обучение может занять несколько минут.";
pub const NOT_LOADED: &str =
    "❌ Модель не загружена. Попробуйте позже или обратитесь к администратору.";
pub const TOO_LONG: &str = "❌ Первая строка слишком длинная. Попробуйте что-то покороче.";
pub const TOO_SHORT: &str = "❌ Первая строка слишком короткая. Напишите хотя бы несколько слов.";
pub const EMPTY_RESULT: &str = "😅 Не получилось создать хокку. Попробуйте другую первую строку.";
pub const EMPTY_REGENERATION: &str = "😅 Не получилось создать новый вариант. Попробуйте еще раз.";
pub const GENERATION_FAILED: &str = "😵 Произошла ошибка при создании хокку. Попробуйте еще раз.";
pub const REGENERATION_FAILED: &str =
    "😵 Произошла ошибка при создании нового варианта. Попробуйте еще раз.";
pub const NOT_ADMIN: &str = "❌ У вас нет прав для выполнения этой команды.";
pub const ALREADY_TRAINING: &str = "🔄 Обучение уже в процессе...";
pub const RETRAIN_STARTED: &str = "🚀 Начинаем переобучение модели...";
pub const RETRAIN_DONE: &str = "✅ Модель переобучена!";
pub const RETRAIN_PENDING: &str = "⏳ Обучение продолжается в фоне, модель обновится позже.";
pub const RETRAIN_FAILED: &str = "❌ Не удалось переобучить модель.";
pub const UNKNOWN_ACTION: &str = "🤔 Неизвестное действие.";

pub fn examples_text() -> String {
    let mut text = String::from("📖 ПРИМЕРЫ ХОККУ:\n\n");
    for (i, (first_line, continuation)) in EXAMPLES.iter().enumerate() {
        text.push_str(&format!("{}. {}\n{}\n\n", i + 1, first_line, continuation));
    }
    text.push_str("💡 Попробуйте написать свою первую строку!");
    text
}

pub fn haiku_text(first_line: &str, completion: &str, regenerated: bool) -> String {
    let title = if regenerated {
        "Новый вариант хокку"
    } else {
        "Ваше хокку"
    };
    format!(
        "🌸 **{}:**\n\n*{}*\n{}\n\n✨ *Создано нейросетью*",
        title, first_line, completion
    )
}

pub fn random_start_text(first_line: &str) -> String {
    format!(
        "🎲 Случайная первая строка: **{}**\n\nОтправьте эту строку для генерации хокку!",
        first_line
    )
}

pub fn saved_text(first_line: &str, completion: &str) -> String {
    format!(
        "💾 **Сохраненное хокку:**\n\n{}\n{}\n\n📋 Готово для копирования!",
        first_line, completion
    )
}
